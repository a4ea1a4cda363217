//! `PatternStream`: a [`Fill`] source that renders a song block by block.

use chiptune_core::{GbSynth, RenderOptions, Song, StreamState};

use crate::playback::Fill;

/// One playback session of a song: synth, voicing and the stream cursor.
#[derive(Clone, Debug)]
pub struct PatternStream {
    synth: GbSynth,
    song: Song,
    opts: RenderOptions,
    state: StreamState,
    started: bool,
}

impl PatternStream {
    /// Render `song` at `sample_rate`; `ch1_sine` turns voice 1 into a sine.
    pub fn new(sample_rate: u32, song: Song, ch1_sine: bool) -> Self {
        Self {
            synth: GbSynth::new(sample_rate),
            opts: song.render_options(ch1_sine),
            song,
            state: StreamState::new(),
            started: false,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Samples a complete pass of the song produces.
    pub fn total_samples(&self) -> usize {
        self.synth.total_samples(&self.song.pattern, self.song.tempo)
    }

    /// Step being played, clamped to the last step; `None` before the first block.
    pub fn playhead(&self) -> Option<usize> {
        if !self.started || self.song.pattern.steps == 0 {
            return None;
        }
        Some(self.state.step.min(self.song.pattern.steps - 1))
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished(&self.song.pattern)
    }

    /// Rewind to the start with a fresh oscillator/LFSR state.
    pub fn reset(&mut self) {
        self.state = StreamState::new();
        self.started = false;
    }

    /// Swap the song; takes effect at the cursor's current position.
    pub fn set_song(&mut self, song: Song) {
        self.opts = RenderOptions {
            duty2: song.duty2(),
            noise_short: song.noise_short,
            ..self.opts
        };
        self.song = song;
    }
}

impl Fill for PatternStream {
    fn fill(&mut self, dst: &mut [i16]) -> usize {
        let written = self.synth.render_block(
            &self.song.pattern,
            self.song.tempo,
            &self.opts,
            &mut self.state,
            dst,
        );
        if written > 0 {
            self.started = true;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiptune_core::Pattern;

    fn arpeggio() -> Song {
        let mut pat = Pattern::default();
        for (i, n) in [60u8, 64, 67, 72].iter().enumerate() {
            pat.set_pulse1(i * 4, Some(*n));
        }
        pat.set_noise(3, Some(1));
        Song { tempo: 150, duty2_index: 1, noise_short: true, pattern: pat }
    }

    #[test]
    fn stream_matches_bulk_render() {
        let song = arpeggio();
        let mut stream = PatternStream::new(11_025, song.clone(), true);
        let expected = GbSynth::new(11_025).render(&song.pattern, song.tempo, &song.render_options(true));

        let mut got = Vec::new();
        let mut buf = [0i16; 333];
        loop {
            let n = stream.fill(&mut buf);
            got.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                break;
            }
        }
        assert_eq!(got.len(), stream.total_samples());
        assert_eq!(got, expected);
        assert!(stream.is_finished());
    }

    #[test]
    fn playhead_tracks_steps() {
        let song = arpeggio();
        let mut stream = PatternStream::new(8_000, song, false);
        assert_eq!(stream.playhead(), None);

        let step = GbSynth::new(8_000).step_samples(150);
        let mut buf = vec![0i16; step * 2 + 10];
        stream.fill(&mut buf);
        assert_eq!(stream.playhead(), Some(2));

        let mut rest = vec![0i16; stream.total_samples()];
        stream.fill(&mut rest);
        assert_eq!(stream.playhead(), Some(15));

        stream.reset();
        assert_eq!(stream.playhead(), None);
        assert_eq!(stream.state(), &StreamState::new());
    }
}
