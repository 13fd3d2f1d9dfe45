//! Shared session state backends.
//!
//! [`MemoryStore`] serves roles living in one process. [`FileStore`] shares a
//! JSON document between processes on the same machine (or a shared mount).

pub mod file;
pub mod memory;

pub use file::{FileStore, DEFAULT_LOCK_TIMEOUT};
pub use memory::{MemoryStore, SessionHandle};
