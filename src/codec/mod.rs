//! Sample codec
//!
//! Converts between floating-point audio frames and the transport
//! representation: 16-bit signed little-endian PCM wrapped in base64,
//! tagged with a MIME-style rate string.

pub mod pcm;

pub use pcm::{decode_chunk, encode_samples, to_transport, EncodedChunk};
