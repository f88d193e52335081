use serde::{Deserialize, Serialize};

/// Which way audio moves through the hardware ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Segments are written into the device buffer ahead of the play cursor.
    Playback,
    /// Segments are filled from the device buffer behind the read cursor.
    Capture,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Playback => "playback",
            Self::Capture => "capture",
        }
    }
}

/// Interleaved PCM format of the hardware buffer.
///
/// `bytes_per_sample` is the size of one frame across all channels
/// (the block alignment), so it must be a multiple of `channels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bytes_per_sample: u32,
}

impl FormatSpec {
    pub fn new(channels: u16, sample_rate: u32, bytes_per_sample: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bytes_per_sample,
        }
    }

    /// 16-bit interleaved PCM.
    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self::new(channels, sample_rate, channels as u32 * 2)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.channels == 0 {
            return Err("channel count must be at least 1".into());
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.bytes_per_sample == 0 {
            return Err("bytes per sample must be positive".into());
        }
        if self.bytes_per_sample % self.channels as u32 != 0 {
            return Err(format!(
                "bytes per sample ({}) is not a multiple of the channel count ({})",
                self.bytes_per_sample, self.channels
            ));
        }
        Ok(())
    }

    /// Bit depth of a single channel sample.
    pub fn bits_per_sample(&self) -> u16 {
        (self.bytes_per_sample * 8 / self.channels as u32) as u16
    }

    pub fn avg_bytes_per_sec(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_sample as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_quality_stereo() {
        let format = FormatSpec::pcm16(2, 44100);
        assert!(format.validate().is_ok());
        assert_eq!(format.bytes_per_sample, 4);
        assert_eq!(format.bits_per_sample(), 16);
        assert_eq!(format.avg_bytes_per_sec(), 176_400);
    }

    #[test]
    fn rejects_invalid_formats() {
        assert!(FormatSpec::new(0, 44100, 4).validate().is_err());
        assert!(FormatSpec::new(2, 0, 4).validate().is_err());
        assert!(FormatSpec::new(2, 44100, 0).validate().is_err());
        assert!(FormatSpec::new(2, 44100, 3).validate().is_err());
    }

    #[test]
    fn direction_serializes_lowercase() {
        let json = serde_json::to_string(&Direction::Capture).unwrap();
        assert_eq!(json, "\"capture\"");
    }
}
