use thiserror::Error;

/// `ProtocolError` taxonomy (§7): fatal for the connection. Every decode call site
/// operates on untrusted bytes, so there is no infallible "unchecked" read path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown message type discriminator 0x{0:02x}")]
    UnknownMessageType(u8),

    #[error("registry hash mismatch: expected 0x{expected:08x}, got 0x{got:08x}")]
    RegistryHashMismatch { expected: u32, got: u32 },

    #[error("unknown wire id {0}")]
    UnknownWireId(u8),

    #[error("field bitmask 0x{mask:04x} sets bits beyond the {field_count} declared fields of wire id {wire_id}")]
    FieldMaskOverflow {
        wire_id: u8,
        mask: u16,
        field_count: usize,
    },

    #[error("varint exceeds the maximum of 5 encoded bytes")]
    VarintOverflow,

    #[error("buffer ended before the expected data was read")]
    TruncatedBuffer,

    #[error("string length prefix of {declared} bytes exceeds {remaining} remaining bytes")]
    StringLengthOverflow { declared: usize, remaining: usize },
}
