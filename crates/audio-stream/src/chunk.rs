//! Chunk table computation.
//!
//! The source is walked in nominal windows of `chunk_length_ms`. Every chunk
//! after the first starts `overlap` frames before its window so the decoder can
//! warm up on audio that the previous chunk already played. Offsets are whole
//! frames, so byte slicing never tears a sample.

use audio_stream_types::ChunkDescriptor;

use crate::error::StreamError;
use crate::format::PcmFormat;

/// Partition `total_frames` of `format` audio into overlapping chunks.
///
/// The final chunk ends exactly at `total_frames` and may be shorter than the
/// nominal window.
pub fn partition(
    format: &PcmFormat,
    total_frames: u64,
    chunk_length_ms: u64,
    overlap_ms: u64,
) -> Result<Vec<ChunkDescriptor>, StreamError> {
    if total_frames == 0 {
        return Err(StreamError::EmptyBuffer);
    }
    let window = format.ms_to_frames(chunk_length_ms);
    if window == 0 {
        return Err(StreamError::InvalidConfig(format!(
            "chunk length {chunk_length_ms}ms is shorter than one frame"
        )));
    }
    let overlap = format.ms_to_frames(overlap_ms);
    if overlap >= window {
        return Err(StreamError::InvalidConfig(format!(
            "overlap {overlap_ms}ms must be shorter than chunk length {chunk_length_ms}ms"
        )));
    }

    let count = total_frames.div_ceil(window);
    let mut chunks = Vec::with_capacity(count as usize);
    for index in 0..count {
        let window_start = index * window;
        let window_end = (window_start + window).min(total_frames);
        let first = index == 0;
        let last = index + 1 == count;

        let lead_in = if first { 0 } else { overlap };
        chunks.push(ChunkDescriptor {
            id: index as u32,
            start_time_offset_ms: format.frames_to_ms(window_start),
            end_time_offset_ms: format.frames_to_ms(window_end),
            lead_in_duration_ms: if first { 0 } else { overlap_ms },
            lead_out_duration_ms: if last { 0 } else { overlap_ms },
            overlap_time_ms: overlap_ms,
            start_sample_offset: window_start - lead_in,
            end_sample_offset: window_end,
            locator: None,
        });
    }

    tracing::debug!(
        chunks = chunks.len(),
        window_frames = window,
        overlap_frames = overlap,
        total_frames,
        "chunk table computed"
    );
    Ok(chunks)
}
