#[cfg(target_endian = "big")]
pub const NATIVE_BYTE_ORDER: ByteOrder = ByteOrder::Big;

#[cfg(target_endian = "little")]
pub const NATIVE_BYTE_ORDER: ByteOrder = ByteOrder::Little;

/// Byte order of dataset payloads in an NH5 container.
///
/// The header carries no byte order tag, so readers and writers agree on little endian.
pub const NH5_BYTE_ORDER: ByteOrder = ByteOrder::Little;

/// Byte order / endianness.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByteOrder {
    /// Big Endian
    Big,
    /// Little Endian
    Little,
}

impl ByteOrder {
    /// Returns true if values in this byte order must be swapped to be read on this host.
    pub fn needs_swap(self) -> bool {
        self != NATIVE_BYTE_ORDER
    }
}
