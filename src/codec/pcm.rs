//! PCM16 transport codec
//!
//! The remote channel carries raw PCM16-LE audio as base64 text with a
//! `audio/pcm;rate=NNNNN` tag. Outbound microphone blocks are quantized
//! from f32, inbound synthesized chunks are restored to per-channel f32
//! buffers for playback.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::audio::frame::AudioFrame;
use crate::constants::CAPTURE_MIME;
use crate::error::CodecError;

/// A transport-ready audio chunk: base64 PCM16-LE plus its rate tag.
///
/// Serializes to the channel's wire shape (`{"data": ..., "mimeType": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedChunk {
    /// Base64-encoded little-endian 16-bit signed PCM
    pub data: String,
    /// Rate/encoding tag, e.g. `audio/pcm;rate=16000`
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Encode interleaved f32 samples as a transport chunk.
///
/// Samples outside [-1.0, 1.0] are clamped before quantization rather
/// than letting the int16 conversion wrap.
pub fn encode_samples(samples: &[f32], mime_type: &str) -> EncodedChunk {
    let mut pcm = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * 32768.0).clamp(-32768.0, 32767.0);
        pcm.put_i16_le(scaled as i16);
    }

    EncodedChunk {
        data: BASE64.encode(&pcm),
        mime_type: mime_type.to_string(),
    }
}

/// Encode a captured microphone frame for the outbound channel.
pub fn to_transport(frame: &AudioFrame) -> EncodedChunk {
    encode_samples(&frame.samples, CAPTURE_MIME)
}

/// Decode a transport chunk into per-channel f32 sample buffers.
///
/// Fails with [`CodecError::MalformedChunk`] when the payload length is
/// not a whole number of 16-bit frames for the given channel count, and
/// with [`CodecError::InvalidEncoding`] when the base64 wrapper itself
/// is broken. Either way the chunk is unusable and should be dropped;
/// neither failure is fatal to the session.
pub fn decode_chunk(chunk: &EncodedChunk, channels: u16) -> Result<Vec<Vec<f32>>, CodecError> {
    let raw = BASE64
        .decode(chunk.data.as_bytes())
        .map_err(|e| CodecError::InvalidEncoding(e.to_string()))?;

    let frame_bytes = 2 * channels as usize;
    if channels == 0 || raw.len() % frame_bytes != 0 {
        return Err(CodecError::MalformedChunk {
            len: raw.len(),
            channels,
        });
    }

    let frames = raw.len() / frame_bytes;
    let mut out = vec![Vec::with_capacity(frames); channels as usize];
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channels as usize].push(f32::from(value) / 32768.0);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CAPTURE_SAMPLE_RATE, PLAYBACK_MIME};
    use proptest::prelude::*;

    fn frame(samples: Vec<f32>) -> AudioFrame {
        AudioFrame::new(samples, CAPTURE_SAMPLE_RATE, 1)
    }

    #[test]
    fn roundtrip_is_within_quantization_error() {
        let samples = vec![0.0, 0.25, -0.25, 0.9999, -1.0, 1.0, 0.5];
        let chunk = to_transport(&frame(samples.clone()));
        let decoded = decode_chunk(&chunk, 1).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].len(), samples.len());
        for (orig, got) in samples.iter().zip(&decoded[0]) {
            assert!(
                (orig - got).abs() <= 1.0 / 32768.0 + f32::EPSILON,
                "sample {orig} decoded as {got}"
            );
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped_not_wrapped() {
        let chunk = encode_samples(&[2.0, -3.0], CAPTURE_MIME);
        let decoded = decode_chunk(&chunk, 1).unwrap();
        assert!((decoded[0][0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[0][1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn capture_chunk_carries_rate_tag() {
        let chunk = to_transport(&frame(vec![0.0; 16]));
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
    }

    #[test]
    fn odd_byte_length_is_malformed() {
        let chunk = EncodedChunk {
            data: BASE64.encode([1u8, 2, 3]),
            mime_type: PLAYBACK_MIME.to_string(),
        };
        match decode_chunk(&chunk, 1) {
            Err(CodecError::MalformedChunk { len: 3, channels: 1 }) => {}
            other => panic!("expected MalformedChunk, got {other:?}"),
        }
    }

    #[test]
    fn stereo_length_must_cover_both_channels() {
        // 6 bytes = 3 samples, which cannot de-interleave into 2 channels
        let chunk = EncodedChunk {
            data: BASE64.encode([0u8; 6]),
            mime_type: PLAYBACK_MIME.to_string(),
        };
        assert!(decode_chunk(&chunk, 2).is_err());
        // 8 bytes = 2 frames of 2 channels
        let chunk = EncodedChunk {
            data: BASE64.encode([0u8; 8]),
            mime_type: PLAYBACK_MIME.to_string(),
        };
        let decoded = decode_chunk(&chunk, 2).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].len(), 2);
        assert_eq!(decoded[1].len(), 2);
    }

    #[test]
    fn broken_base64_is_invalid_encoding() {
        let chunk = EncodedChunk {
            data: "not base64!!!".to_string(),
            mime_type: PLAYBACK_MIME.to_string(),
        };
        assert!(matches!(
            decode_chunk(&chunk, 1),
            Err(CodecError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn stereo_deinterleave_order() {
        // L0 R0 L1 R1 as i16: 100, -100, 200, -200
        let mut raw = Vec::new();
        for v in [100i16, -100, 200, -200] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let chunk = EncodedChunk {
            data: BASE64.encode(&raw),
            mime_type: PLAYBACK_MIME.to_string(),
        };
        let decoded = decode_chunk(&chunk, 2).unwrap();
        assert!((decoded[0][0] - 100.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[0][1] - 200.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[1][0] + 100.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[1][1] + 200.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn wire_shape_matches_channel_blob() {
        let chunk = encode_samples(&[0.0], CAPTURE_MIME);
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("data").is_some());
        assert_eq!(json["mimeType"], "audio/pcm;rate=16000");
    }

    proptest! {
        #[test]
        fn roundtrip_property(samples in proptest::collection::vec(-1.0f32..=1.0, 1..512)) {
            let chunk = encode_samples(&samples, CAPTURE_MIME);
            let decoded = decode_chunk(&chunk, 1).unwrap();
            prop_assert_eq!(decoded[0].len(), samples.len());
            for (orig, got) in samples.iter().zip(&decoded[0]) {
                prop_assert!((orig - got).abs() <= 1.0 / 32768.0 + f32::EPSILON);
            }
        }
    }
}
