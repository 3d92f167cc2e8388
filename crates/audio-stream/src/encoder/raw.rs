use super::{Encoder, EncoderError, EncoderKind};
use crate::format::PcmFormat;

/// Hands PCM through untouched, tagged as raw PCM for the engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughEncoder;

impl Encoder for PassthroughEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Passthrough
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn mime_type(&self) -> &'static str {
        "audio/pcm"
    }

    fn encode(&self, pcm: &[u8], _format: &PcmFormat) -> Result<Vec<u8>, EncoderError> {
        Ok(pcm.to_vec())
    }
}

/// Identity transform with an opaque content type.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEncoder;

impl Encoder for NullEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Null
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn mime_type(&self) -> &'static str {
        "application/octet-stream"
    }

    fn encode(&self, pcm: &[u8], _format: &PcmFormat) -> Result<Vec<u8>, EncoderError> {
        Ok(pcm.to_vec())
    }
}
