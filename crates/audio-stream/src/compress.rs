//! Optional dynamic range compression applied to chunk PCM before encoding.

use crate::config::CompressionConfig;
use crate::format::PcmFormat;

/// Apply a hard-knee compressor to every sample of `pcm` in place.
///
/// Levels above `threshold` (a ratio of full scale) are scaled down by `ratio`.
/// Layout and length are preserved, so frame offsets stay valid.
pub fn compress_in_place(pcm: &mut [u8], format: &PcmFormat, config: &CompressionConfig) {
    let threshold = config.threshold.clamp(0.0, 1.0);
    let ratio = if config.ratio.is_finite() && config.ratio >= 1.0 {
        config.ratio
    } else {
        1.0
    };
    if ratio == 1.0 || threshold >= 1.0 {
        return;
    }

    let width = format.bytes_per_sample();
    let (_, max) = format.sample_bounds();
    let full_scale = max as f32;

    for sample in pcm.chunks_exact_mut(width) {
        let value = format.read_sample(sample);
        let level = (value as f32 / full_scale).abs();
        if level <= threshold {
            continue;
        }
        let compressed = threshold + (level - threshold) / ratio;
        let out = (compressed * full_scale).round() as i32 * value.signum();
        format.write_sample(out, sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn read_s16(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn quiet_samples_are_untouched() {
        let format = PcmFormat::s16le(44_100, 1).unwrap();
        let mut pcm = s16(&[0, 100, -100, 16_000]);
        let before = pcm.clone();
        compress_in_place(&mut pcm, &format, &CompressionConfig::default());
        assert_eq!(pcm, before);
    }

    #[test]
    fn loud_samples_are_reduced_symmetrically() {
        let format = PcmFormat::s16le(44_100, 1).unwrap();
        let mut pcm = s16(&[i16::MAX, -i16::MAX]);
        compress_in_place(
            &mut pcm,
            &format,
            &CompressionConfig {
                threshold: 0.5,
                ratio: 2.0,
            },
        );
        let out = read_s16(&pcm);
        // 0.5 + (1.0 - 0.5) / 2 = 0.75 of full scale
        assert_eq!(out[0], 24_575);
        assert_eq!(out[1], -24_575);
    }

    #[test]
    fn unity_ratio_is_a_no_op() {
        let format = PcmFormat::s16le(44_100, 1).unwrap();
        let mut pcm = s16(&[i16::MAX]);
        compress_in_place(
            &mut pcm,
            &format,
            &CompressionConfig {
                threshold: 0.1,
                ratio: 1.0,
            },
        );
        assert_eq!(read_s16(&pcm), vec![i16::MAX]);
    }
}
