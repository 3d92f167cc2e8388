//! RIFF/WAVE wrapping with `hound`.

use std::io::Cursor;

use super::{Encoder, EncoderError, EncoderKind};
use crate::format::PcmFormat;

/// Wraps a PCM slice in a WAVE header describing its format.
///
/// Samples are rewritten in WAVE byte order (little-endian; unsigned for 8-bit)
/// regardless of the source layout. Always supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaveEncoder;

impl Encoder for WaveEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Wave
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn mime_type(&self) -> &'static str {
        "audio/wav"
    }

    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncoderError> {
        let spec = hound::WavSpec {
            channels: format.channels(),
            sample_rate: format.sample_rate(),
            bits_per_sample: format.bits_per_sample(),
            sample_format: hound::SampleFormat::Int,
        };

        let width = format.bytes_per_sample();
        let whole = pcm.len() - pcm.len() % format.bytes_per_frame();
        let mut cursor = Cursor::new(Vec::with_capacity(whole + 68));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| EncoderError::Failed(format!("wav header: {e}")))?;
            for sample in pcm[..whole].chunks_exact(width) {
                writer
                    .write_sample(format.read_sample(sample))
                    .map_err(|e| EncoderError::Failed(format!("wav sample: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| EncoderError::Failed(format!("wav finalize: {e}")))?;
        }
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_readable_wave_with_same_samples() {
        let format = PcmFormat::s16le(22_050, 2).unwrap();
        let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 42];
        let pcm: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();

        let wav = WaveEncoder.encode(&pcm, &format).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn big_endian_source_is_rewritten_little_endian() {
        let format = PcmFormat::new(8000, 1, 16, true, true).unwrap();
        let pcm = [0x01, 0x02];
        let wav = WaveEncoder.encode(&pcm, &format).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![0x0102]);
    }

    #[test]
    fn unsigned_eight_bit_survives() {
        let format = PcmFormat::new(8000, 1, 8, false, false).unwrap();
        let pcm = [0x00, 0x80, 0xff];
        let wav = WaveEncoder.encode(&pcm, &format).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i8> = reader.samples::<i8>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![-128, 0, 127]);
    }
}
