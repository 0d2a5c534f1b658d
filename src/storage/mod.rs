//! Storage backends for state that must outlive or sit outside the hub process

pub mod memory;
pub mod traits;

pub use memory::MemoryPresenceStore;
pub use traits::PresenceStore;
