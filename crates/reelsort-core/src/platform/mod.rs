//! Platform abstraction layer.
//!
//! OS-specific `#[cfg]` blocks live here rather than in the executor.
//!
//! - `permissions` - delete-permission checks and repair

pub mod permissions;

pub use permissions::{can_delete, fix_permissions, Ownership};
