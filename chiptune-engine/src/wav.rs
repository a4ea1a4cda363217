//! 16-bit PCM WAV file sink.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::sink::AudioSink;

pub struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
    sample_rate: u32,
    channels: u16,
    frames: usize,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, channels: u16) -> Result<Self> {
        let channels = channels.max(1);
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self { writer, sample_rate, channels, frames: 0 })
    }

    /// Frames written so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Patch the header sizes and flush. Dropping without this also
    /// finalizes, but swallows the error.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

impl AudioSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, interleaved: &[i16]) -> Result<()> {
        for &s in interleaved {
            self.writer.write_sample(s)?;
        }
        self.frames += interleaved.len() / usize::from(self.channels);
        Ok(())
    }
}
