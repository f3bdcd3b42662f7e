//! 记忆：任务内的只追加账本（仅进程内，不做持久化）

pub mod ledger;

pub use ledger::{ActionRecord, Ledger, MemoryEntry};
