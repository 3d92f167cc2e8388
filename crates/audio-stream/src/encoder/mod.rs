//! Pluggable PCM encoders and the policy for picking one.
//!
//! Every chunk is handed to exactly one [`Encoder`]. Identity and WAVE encoders
//! are always available; MP3 and OGG delegate to external [`CodecBackend`]
//! plugins and report themselves unsupported without one.

mod plugin;
mod raw;
mod wave;

use std::fmt;
use std::sync::Arc;

use crate::format::PcmFormat;

pub use plugin::{CodecBackend, Mp3Encoder, OggEncoder};
pub use raw::{NullEncoder, PassthroughEncoder};
pub use wave::WaveEncoder;

/// Encoder variants known to the selection policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncoderKind {
    Passthrough,
    Null,
    Wave,
    Mp3,
    Ogg,
}

impl EncoderKind {
    /// Selection preference; higher wins.
    fn preference(self) -> u8 {
        match self {
            EncoderKind::Ogg => 3,
            EncoderKind::Mp3 => 2,
            EncoderKind::Wave => 1,
            EncoderKind::Passthrough | EncoderKind::Null => 0,
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncoderKind::Passthrough => "passthrough",
            EncoderKind::Null => "null",
            EncoderKind::Wave => "wave",
            EncoderKind::Mp3 => "mp3",
            EncoderKind::Ogg => "ogg",
        };
        f.write_str(name)
    }
}

/// Failure of a single encode call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("codec {0} is not supported")]
    Unsupported(EncoderKind),

    #[error("{0}")]
    Failed(String),
}

/// Transform raw PCM bytes into a codec's byte representation.
pub trait Encoder: Send + Sync {
    fn kind(&self) -> EncoderKind;

    /// Whether the runtime can use this encoder. Callers check before selecting.
    fn is_supported(&self) -> bool;

    /// Whether encoding should run off the caller's thread.
    fn runs_async(&self) -> bool {
        false
    }

    /// MIME type of the encoded bytes.
    fn mime_type(&self) -> &'static str;

    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncoderError>;
}

/// Pick the best supported compressed encoder, falling back to WAVE.
///
/// OGG is preferred over MP3; anything that is not a supported OGG/MP3
/// candidate is ignored.
pub fn choose_encoder(candidates: &[Arc<dyn Encoder>]) -> Arc<dyn Encoder> {
    let best = candidates
        .iter()
        .filter(|e| matches!(e.kind(), EncoderKind::Ogg | EncoderKind::Mp3))
        .filter(|e| e.is_supported())
        .max_by_key(|e| e.kind().preference());

    match best {
        Some(encoder) => {
            tracing::info!(codec = %encoder.kind(), "encoder selected");
            encoder.clone()
        }
        None => {
            tracing::info!(codec = %EncoderKind::Wave, "no compressed codec available, using fallback");
            Arc::new(WaveEncoder)
        }
    }
}

/// Codec plugins available in this runtime.
#[derive(Clone, Default)]
pub struct FeatureSupport {
    ogg: Option<Arc<dyn CodecBackend>>,
    mp3: Option<Arc<dyn CodecBackend>>,
}

impl FeatureSupport {
    /// Only the built-in encoders.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_ogg(mut self, backend: Arc<dyn CodecBackend>) -> Self {
        self.ogg = Some(backend);
        self
    }

    /// Register an MP3 backend; only do so where MP3 licensing allows it.
    pub fn with_mp3(mut self, backend: Arc<dyn CodecBackend>) -> Self {
        self.mp3 = Some(backend);
        self
    }

    pub fn is_ogg_supported(&self) -> bool {
        self.ogg.is_some()
    }

    pub fn is_mp3_supported(&self) -> bool {
        self.mp3.is_some()
    }

    /// Candidate encoders in no particular order.
    pub fn candidates(&self) -> Vec<Arc<dyn Encoder>> {
        vec![
            Arc::new(OggEncoder::new(self.ogg.clone())),
            Arc::new(Mp3Encoder::new(self.mp3.clone())),
            Arc::new(WaveEncoder),
        ]
    }

    /// Apply [`choose_encoder`] to this runtime's candidates.
    pub fn choose(&self) -> Arc<dyn Encoder> {
        choose_encoder(&self.candidates())
    }
}

impl fmt::Debug for FeatureSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSupport")
            .field("ogg", &self.is_ogg_supported())
            .field("mp3", &self.is_mp3_supported())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    impl CodecBackend for Identity {
        fn encode(&self, pcm: &[u8], _format: &PcmFormat) -> anyhow::Result<Vec<u8>> {
            Ok(pcm.to_vec())
        }
    }

    #[test]
    fn falls_back_to_wave_without_plugins() {
        let chosen = FeatureSupport::builtin().choose();
        assert_eq!(chosen.kind(), EncoderKind::Wave);
        assert!(chosen.is_supported());
    }

    #[test]
    fn prefers_ogg_over_mp3() {
        let support = FeatureSupport::builtin()
            .with_mp3(Arc::new(Identity))
            .with_ogg(Arc::new(Identity));
        assert_eq!(support.choose().kind(), EncoderKind::Ogg);
    }

    #[test]
    fn uses_mp3_when_only_mp3_is_available() {
        let support = FeatureSupport::builtin().with_mp3(Arc::new(Identity));
        assert_eq!(support.choose().kind(), EncoderKind::Mp3);
    }

    #[test]
    fn ignores_unsupported_and_identity_candidates() {
        let candidates: Vec<Arc<dyn Encoder>> = vec![
            Arc::new(OggEncoder::new(None)),
            Arc::new(PassthroughEncoder),
            Arc::new(NullEncoder),
        ];
        assert_eq!(choose_encoder(&candidates).kind(), EncoderKind::Wave);
    }
}
