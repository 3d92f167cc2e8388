use std::sync::Arc;

use super::{Encoder, EncoderError, EncoderKind};
use crate::format::PcmFormat;

/// External codec implementation plugged into an MP3 or OGG encoder.
pub trait CodecBackend: Send + Sync {
    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> anyhow::Result<Vec<u8>>;

    /// Compressed codecs are slow enough to run on a worker thread by default.
    fn runs_async(&self) -> bool {
        true
    }
}

fn encode_with(
    kind: EncoderKind,
    backend: Option<&Arc<dyn CodecBackend>>,
    pcm: &[u8],
    format: &PcmFormat,
) -> Result<Vec<u8>, EncoderError> {
    let backend = backend.ok_or(EncoderError::Unsupported(kind))?;
    backend
        .encode(pcm, format)
        .map_err(|e| EncoderError::Failed(format!("{kind}: {e:#}")))
}

/// MP3 output through an optional plugin.
#[derive(Clone, Default)]
pub struct Mp3Encoder {
    backend: Option<Arc<dyn CodecBackend>>,
}

impl Mp3Encoder {
    pub fn new(backend: Option<Arc<dyn CodecBackend>>) -> Self {
        Self { backend }
    }
}

impl Encoder for Mp3Encoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Mp3
    }

    fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    fn runs_async(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.runs_async())
    }

    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }

    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncoderError> {
        encode_with(self.kind(), self.backend.as_ref(), pcm, format)
    }
}

/// OGG output through an optional plugin.
#[derive(Clone, Default)]
pub struct OggEncoder {
    backend: Option<Arc<dyn CodecBackend>>,
}

impl OggEncoder {
    pub fn new(backend: Option<Arc<dyn CodecBackend>>) -> Self {
        Self { backend }
    }
}

impl Encoder for OggEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Ogg
    }

    fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    fn runs_async(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.runs_async())
    }

    fn mime_type(&self) -> &'static str {
        "audio/ogg"
    }

    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncoderError> {
        encode_with(self.kind(), self.backend.as_ref(), pcm, format)
    }
}
