//! Raw PCM layout and the byte/frame/time conversions built on it.

use crate::error::StreamError;

/// Layout of interleaved raw PCM data.
///
/// Validated on construction and immutable afterwards. A frame holds one
/// sample for every channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    signed: bool,
    big_endian: bool,
}

impl PcmFormat {
    /// Build a format, rejecting layouts that cannot address whole frames.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
        signed: bool,
        big_endian: bool,
    ) -> Result<Self, StreamError> {
        if sample_rate == 0 {
            return Err(StreamError::InvalidFormat(
                "sample rate must be positive".to_string(),
            ));
        }
        if channels == 0 {
            return Err(StreamError::InvalidFormat(
                "channel count must be positive".to_string(),
            ));
        }
        if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(StreamError::InvalidFormat(format!(
                "unsupported bit depth {bits_per_sample}"
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            bits_per_sample,
            signed,
            big_endian,
        })
    }

    /// Signed 16-bit little-endian, the layout produced by the decoder.
    pub fn s16le(sample_rate: u32, channels: u16) -> Result<Self, StreamError> {
        Self::new(sample_rate, channels, 16, true, false)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// `channels * bits_per_sample / 8`.
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Whole frames contained in `len` bytes; a trailing partial frame is ignored.
    pub fn frames_in(&self, len: usize) -> u64 {
        (len / self.bytes_per_frame()) as u64
    }

    /// Byte offset of frame `frame`.
    pub fn frame_to_byte(&self, frame: u64) -> usize {
        (frame as usize).saturating_mul(self.bytes_per_frame())
    }

    /// Frames to milliseconds, rounded down.
    pub fn frames_to_ms(&self, frames: u64) -> u64 {
        frames.saturating_mul(1000) / u64::from(self.sample_rate)
    }

    /// Milliseconds to frames, rounded down.
    pub fn ms_to_frames(&self, ms: u64) -> u64 {
        ms.saturating_mul(u64::from(self.sample_rate)) / 1000
    }

    /// `byte_offset / bytes_per_frame / sample_rate * 1000`, frame aligned.
    pub fn byte_offset_to_ms(&self, byte_offset: u64) -> u64 {
        self.frames_to_ms(byte_offset / self.bytes_per_frame() as u64)
    }

    /// Smallest and largest sample value as returned by [`read_sample`](Self::read_sample).
    pub fn sample_bounds(&self) -> (i32, i32) {
        let bits = u32::from(self.bits_per_sample);
        let max = ((1i64 << (bits - 1)) - 1) as i32;
        let min = (-(1i64 << (bits - 1))) as i32;
        (min, max)
    }

    /// Decode one sample from `bytes` (at least `bytes_per_sample` long).
    ///
    /// Unsigned layouts are re-centered around zero so every format shares the
    /// same signed value range.
    pub fn read_sample(&self, bytes: &[u8]) -> i32 {
        let width = self.bytes_per_sample();
        let mut raw: u32 = 0;
        for i in 0..width {
            let byte = if self.big_endian {
                bytes[i]
            } else {
                bytes[width - 1 - i]
            };
            raw = (raw << 8) | u32::from(byte);
        }

        let bits = u32::from(self.bits_per_sample);
        if self.signed {
            let shift = 32 - bits;
            ((raw << shift) as i32) >> shift
        } else {
            (i64::from(raw) - (1i64 << (bits - 1))) as i32
        }
    }

    /// Encode one sample into `out` (at least `bytes_per_sample` long).
    pub fn write_sample(&self, value: i32, out: &mut [u8]) {
        let width = self.bytes_per_sample();
        let bits = u32::from(self.bits_per_sample);
        let (min, max) = self.sample_bounds();
        let value = value.clamp(min, max);
        let raw: u32 = if self.signed {
            value as u32
        } else {
            (i64::from(value) + (1i64 << (bits - 1))) as u32
        };

        for i in 0..width {
            let byte = (raw >> (8 * i)) as u8;
            if self.big_endian {
                out[width - 1 - i] = byte;
            } else {
                out[i] = byte;
            }
        }
    }
}
