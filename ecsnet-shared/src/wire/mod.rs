//! Binary wire codec (§4.2, §6.3): encoder/decoder primitives, varints, message
//! framing and the optional compression boundary.

mod compress;
mod decoder;
mod encoder;
mod error;
mod message;
mod varint;

pub use compress::{compress, decompress};
pub use decoder::Decoder;
pub use encoder::{Encoder, Placeholder};
pub use error::CodecError;
pub use message::{
    decode_message, encode_full_components, encode_message, encode_updated_components,
    encode_wire_ids, set_bit_indices, ClientDeltaBody, DeltaBody, FullComponents, Message,
    UpdatedComponents, MSG_CLIENT_DELTA, MSG_CLIENT_ID, MSG_DELTA, MSG_FULL, MSG_RECONNECT,
    MSG_REQUEST_FULL,
};
pub use varint::{read_varint, write_varint, MAX_VARINT_BYTES};
