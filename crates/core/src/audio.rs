//! PCM to WAV container encoding for synthesized speech audio.

/// Describes the layout of a raw PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bytes per sample, e.g. 2 for 16-bit PCM.
    pub sample_width: u16,
}

impl Default for PcmFormat {
    /// The format produced by the speech synthesis backend: mono, 24 kHz, 16-bit.
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 24_000,
            sample_width: 2,
        }
    }
}

impl PcmFormat {
    /// Bytes per frame, or `None` when the product does not fit the WAV
    /// header's 16-bit block align field.
    pub fn block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.sample_width)
    }

    /// Bytes per second, or `None` when the rate overflows the header field.
    pub fn byte_rate(&self) -> Option<u32> {
        self.sample_rate.checked_mul(u32::from(self.block_align()?))
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("PCM buffer is empty")]
    EmptyBuffer,
    #[error("PCM buffer length {len} is not a multiple of the block align {block_align}")]
    Misaligned { len: usize, block_align: u16 },
    #[error("Invalid PCM format: {0}")]
    InvalidFormat(String),
}

/// WAV header size for a single PCM `data` chunk.
const HEADER_LEN: usize = 44;

/// Wraps a raw little-endian PCM buffer in a WAV container.
///
/// The payload is not transcoded; only the 44-byte RIFF/fmt/data header is
/// prepended.
pub fn encode_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, AudioError> {
    if format.channels == 0 {
        return Err(AudioError::InvalidFormat(
            "channel count must be non-zero".to_string(),
        ));
    }
    if format.sample_rate == 0 {
        return Err(AudioError::InvalidFormat(
            "sample rate must be non-zero".to_string(),
        ));
    }
    if format.sample_width == 0 || format.sample_width > 4 {
        return Err(AudioError::InvalidFormat(format!(
            "unsupported sample width: {} bytes",
            format.sample_width
        )));
    }
    if pcm.is_empty() {
        return Err(AudioError::EmptyBuffer);
    }
    let block_align = format.block_align().ok_or_else(|| {
        AudioError::InvalidFormat(format!(
            "block align overflows for {} channels of {} bytes",
            format.channels, format.sample_width
        ))
    })?;
    let byte_rate = format.byte_rate().ok_or_else(|| {
        AudioError::InvalidFormat(format!(
            "byte rate overflows at {} Hz with a block align of {}",
            format.sample_rate, block_align
        ))
    })?;
    if pcm.len() % block_align as usize != 0 {
        return Err(AudioError::Misaligned {
            len: pcm.len(),
            block_align,
        });
    }
    if pcm.len() > (u32::MAX as usize) - (HEADER_LEN - 8) {
        return Err(AudioError::InvalidFormat(
            "PCM buffer too large for a WAV container".to_string(),
        ));
    }

    let data_len = pcm.len() as u32;
    let mut wav = Vec::with_capacity(HEADER_LEN + pcm.len());

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM, uncompressed
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample().to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);

    Ok(wav)
}
