//! Work-stealing scheduling of processes across OS threads (4.A/4.D).

pub mod pool;
pub mod pools;
pub mod suspension_list;
pub mod timeout;
pub mod worker;
