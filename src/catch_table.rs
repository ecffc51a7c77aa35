//! Exception handler ranges compiled into a `CompiledCode` object.
//!
//! Each entry covers a half-open instruction range `[start, end)`; when a
//! throw unwinds through a context whose currently executing instruction
//! falls inside one of its entries, execution resumes at `jump_to` instead
//! of continuing to unwind, with the thrown value stored in `register`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchEntry {
    pub start: u32,
    pub end: u32,
    pub jump_to: u32,

    /// The register the thrown value is stored into once execution resumes
    /// at `jump_to`.
    pub register: u32,
}

impl CatchEntry {
    pub fn new(start: u32, end: u32, jump_to: u32, register: u32) -> Self {
        CatchEntry {
            start,
            end,
            jump_to,
            register,
        }
    }

    pub fn covers(&self, instruction_index: u32) -> bool {
        instruction_index >= self.start && instruction_index < self.end
    }
}

pub type CatchTable = Vec<CatchEntry>;

/// Finds the first entry covering `instruction_index`, if any. The compiler
/// is expected to emit entries for nested `try` expressions in
/// innermost-first order so this also picks the innermost handler.
pub fn entry_for(table: &CatchTable, instruction_index: u32) -> Option<&CatchEntry> {
    table.iter().find(|entry| entry.covers(instruction_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers() {
        let entry = CatchEntry::new(2, 5, 10, 0);

        assert!(!entry.covers(1));
        assert!(entry.covers(2));
        assert!(entry.covers(4));
        assert!(!entry.covers(5));
    }

    #[test]
    fn test_entry_for_picks_first_covering() {
        let table = vec![CatchEntry::new(2, 4, 2, 1), CatchEntry::new(0, 10, 1, 0)];

        let found = entry_for(&table, 3).unwrap();

        assert_eq!(found.jump_to, 2);
        assert_eq!(found.register, 1);
    }

    #[test]
    fn test_entry_for_none() {
        let table = vec![CatchEntry::new(0, 2, 1, 0)];

        assert!(entry_for(&table, 5).is_none());
    }
}
