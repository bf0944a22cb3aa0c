pub mod byte_order;

// Re-export types for convenience.
pub use crate::types::byte_order::{ByteOrder, NATIVE_BYTE_ORDER, NH5_BYTE_ORDER};
