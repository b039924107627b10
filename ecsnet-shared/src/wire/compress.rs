//! Optional `compression` feature: wraps an already-assembled message buffer with
//! zstd at the `Transport` boundary. Off by default, in which case both functions
//! are the identity. The §6.3 framing is always defined over the decompressed
//! bytes (§4.2.1).

use cfg_if::cfg_if;

use super::error::CodecError;

cfg_if! {
    if #[cfg(feature = "compression")] {
        pub fn compress(bytes: &[u8]) -> Vec<u8> {
            zstd::stream::encode_all(bytes, 0).expect("zstd compression is infallible for in-memory buffers")
        }

        pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
            zstd::stream::decode_all(bytes).map_err(|_| CodecError::TruncatedBuffer)
        }
    } else {
        pub fn compress(bytes: &[u8]) -> Vec<u8> {
            bytes.to_vec()
        }

        pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
            Ok(bytes.to_vec())
        }
    }
}
