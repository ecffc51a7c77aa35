//! A table mapping process identifiers (PIDs) to process handles.
//!
//! PIDs are reserved up front (4.G Process identity) so a process can be
//! registered under its final ID before it starts running, and are recycled
//! once a slot's process terminates: a PID is never reused while the table
//! still has a live process under it, but a freed slot's index can be handed
//! out again after that process is removed.

pub type PID = usize;

enum Slot<T> {
    Free,
    Reserved,
    Occupied(T),
}

pub struct ProcessTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<PID>,
}

impl<T> ProcessTable<T> {
    pub fn new() -> Self {
        ProcessTable {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Reserves the next available PID without yet associating a value with
    /// it. Returns `None` if the table has exhausted its capacity -- this
    /// implementation grows the table instead, so reservation never fails in
    /// practice, but the `Option` return keeps the call site identical to a
    /// table with a hard, fixed-size upper bound.
    pub fn reserve(&mut self) -> Option<PID> {
        if let Some(pid) = self.free.pop() {
            self.slots[pid] = Slot::Reserved;

            Some(pid)
        } else {
            let pid = self.slots.len();

            self.slots.push(Slot::Reserved);

            Some(pid)
        }
    }

    /// Associates `value` with a previously reserved PID.
    pub fn map(&mut self, pid: PID, value: T) {
        self.slots[pid] = Slot::Occupied(value);
    }

    pub fn get(&self, pid: PID) -> Option<&T> {
        match self.slots.get(pid) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Removes the process at `pid`, freeing the slot for reuse by a future
    /// reservation.
    pub fn remove(&mut self, pid: PID) -> Option<T> {
        if pid >= self.slots.len() {
            return None;
        }

        let slot = std::mem::replace(&mut self.slots[pid], Slot::Free);
        self.free.push(pid);

        match slot {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ProcessTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_map() {
        let mut table: ProcessTable<u32> = ProcessTable::new();
        let pid = table.reserve().unwrap();

        table.map(pid, 42);

        assert_eq!(table.get(pid), Some(&42));
    }

    #[test]
    fn test_get_missing_pid() {
        let table: ProcessTable<u32> = ProcessTable::new();

        assert_eq!(table.get(99), None);
    }

    #[test]
    fn test_remove_frees_slot_for_reuse() {
        let mut table: ProcessTable<u32> = ProcessTable::new();
        let pid = table.reserve().unwrap();

        table.map(pid, 1);
        assert_eq!(table.remove(pid), Some(1));
        assert_eq!(table.get(pid), None);

        let reused = table.reserve().unwrap();

        assert_eq!(reused, pid);
    }

    #[test]
    fn test_len_excludes_free_slots() {
        let mut table: ProcessTable<u32> = ProcessTable::new();
        let a = table.reserve().unwrap();
        let b = table.reserve().unwrap();

        table.map(a, 1);
        table.map(b, 2);
        assert_eq!(table.len(), 2);

        table.remove(a);
        assert_eq!(table.len(), 1);
    }
}
