// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies, plus the lock guarding a state file
// against concurrent writers.

pub mod file;
pub mod lock;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use lock::StateLock;
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
