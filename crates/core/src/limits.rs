//! Boundary limits (§6). Attribute value size is unbounded by the core
//! itself; a caller-facing adapter is expected to enforce its own cap.

pub const MAX_TRANSACTION_ITEMS: usize = 100;
pub const MAX_BATCH_ITEMS: usize = 25;
