//! Audio output boundary.
//!
//! A sink takes interleaved 16-bit frames at its own sample rate and channel
//! count. `write` may block until the device has room; that is the only
//! suspension point on the playback path.

use crate::error::Result;

/// Something that plays interleaved i16 PCM.
pub trait AudioSink {
    /// Rate the synth must render at.
    fn sample_rate(&self) -> u32;

    /// Interleaved channels per frame (mono is duplicated to all of them).
    fn channels(&self) -> u16;

    /// Queue `interleaved.len() / channels()` frames.
    fn write(&mut self, interleaved: &[i16]) -> Result<()>;

    /// Block until everything written so far has been played.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
    fn channels(&self) -> u16 {
        (**self).channels()
    }
    fn write(&mut self, interleaved: &[i16]) -> Result<()> {
        (**self).write(interleaved)
    }
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Collects everything written to it. Useful offline and in tests.
#[derive(Clone, Debug)]
pub struct MemorySink {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    writes: usize,
}

impl MemorySink {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: Vec::new(),
            writes: 0,
        }
    }

    /// Interleaved samples written so far.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Channel 0 of every frame.
    pub fn first_channel(&self) -> Vec<i16> {
        self.samples
            .chunks_exact(usize::from(self.channels))
            .map(|f| f[0])
            .collect()
    }

    /// Number of `write` calls (chunk count).
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl AudioSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, interleaved: &[i16]) -> Result<()> {
        self.samples.extend_from_slice(interleaved);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_frames() {
        let mut sink = MemorySink::new(8_000, 2);
        sink.write(&[1, 1, 2, 2]).unwrap();
        sink.write(&[3, 3]).unwrap();
        assert_eq!(sink.samples(), &[1, 1, 2, 2, 3, 3]);
        assert_eq!(sink.first_channel(), vec![1, 2, 3]);
        assert_eq!(sink.writes(), 2);
    }

    #[test]
    fn zero_channels_become_mono() {
        let sink = MemorySink::new(8_000, 0);
        assert_eq!(sink.channels(), 1);
    }
}
