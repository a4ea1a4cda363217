//! cpal output sink.
//!
//! `write` hands interleaved chunks to the device callback through a small
//! bounded channel and blocks while it is full, so the producer runs at
//! most a few chunks ahead of the hardware. The callback outputs silence
//! whenever the queue runs dry.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{AudioError, Result};
use crate::sink::AudioSink;

/// Chunks queued ahead of the callback.
const QUEUE_CHUNKS: usize = 4;

/// How long `flush` waits for the device before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Which device to open and how. `None` fields take the device default.
#[derive(Clone, Debug, Default)]
pub struct DeviceOptions {
    pub device_name: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Names of all output devices on the default host.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

pub fn pick_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = name {
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        for d in devices {
            if d.name().is_ok_and(|n| n == name) {
                return Ok(d);
            }
        }
        return Err(AudioError::Device(format!("requested device not found: {name}")));
    }
    host.default_output_device()
        .ok_or_else(|| AudioError::Device("no default output device".into()))
}

/// Closest supported config to the requested rate/channels.
pub fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()));
    }

    let ranges = device
        .supported_output_configs()
        .map_err(|e| AudioError::Device(e.to_string()))?;

    // Sample-rate distance dominates channel distance.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;
        let ch_pen = req_ch.map_or(0, |c| u64::from(range.channels().abs_diff(c)));
        let sr_pen = req_sr.map_or(0, |sr| {
            if (sr_min..=sr_max).contains(&sr) {
                0
            } else {
                u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr)))
            }
        });
        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| AudioError::Device("no supported output configs".into()))?;
    let sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(sr))
}

struct Shared {
    /// Samples written but not yet handed to the device.
    pending: AtomicUsize,
    /// Set while a session is writing; dry callbacks only count as underruns then.
    active: AtomicBool,
    underruns: AtomicUsize,
}

/// Blocking sink over a cpal output stream. Not `Send` on every platform:
/// create it on the thread that writes to it.
pub struct CpalSink {
    _stream: cpal::Stream,
    tx: Sender<Vec<i16>>,
    shared: Arc<Shared>,
    sample_rate: u32,
    channels: u16,
    reported_underruns: usize,
}

impl CpalSink {
    /// Open the requested device (or the default one) and start the stream.
    pub fn open(opts: &DeviceOptions) -> Result<Self> {
        let device = pick_device(opts.device_name.as_deref())?;
        let supported = choose_config(&device, opts.sample_rate, opts.channels)?;
        let sample_format = supported.sample_format();
        let cfg = supported.config();

        log::debug!(
            target: "audio::cpal",
            "opening {:?}: {} Hz x{} ({sample_format:?})",
            device.name().unwrap_or_default(),
            cfg.sample_rate.0,
            cfg.channels
        );

        let (tx, rx) = bounded::<Vec<i16>>(QUEUE_CHUNKS);
        let shared = Arc::new(Shared {
            pending: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            underruns: AtomicUsize::new(0),
        });

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, rx, Arc::clone(&shared))?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, rx, Arc::clone(&shared))?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, rx, Arc::clone(&shared))?,
            other => {
                return Err(AudioError::Device(format!(
                    "unsupported device sample format: {other:?}"
                )))
            }
        };
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            tx,
            shared,
            sample_rate: cfg.sample_rate.0,
            channels: cfg.channels,
            reported_underruns: 0,
        })
    }

    pub fn underruns(&self) -> usize {
        self.shared.underruns.load(Ordering::Relaxed)
    }

    fn report_underruns(&mut self) {
        let now = self.underruns();
        if now > self.reported_underruns {
            log::warn!(
                target: "audio::cpal",
                "{} buffer underrun(s)",
                now - self.reported_underruns
            );
            self.reported_underruns = now;
        }
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, interleaved: &[i16]) -> Result<()> {
        if interleaved.is_empty() {
            return Ok(());
        }
        self.shared.active.store(true, Ordering::Release);
        self.shared.pending.fetch_add(interleaved.len(), Ordering::AcqRel);
        self.tx
            .send(interleaved.to_vec())
            .map_err(|_| AudioError::Disconnected)?;
        self.report_underruns();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // running dry from here on is the end of the session
        self.shared.active.store(false, Ordering::Release);
        self.report_underruns();
        let start = Instant::now();
        while self.shared.pending.load(Ordering::Acquire) > 0 {
            if start.elapsed() > DRAIN_TIMEOUT {
                return Err(AudioError::Stream("timed out draining output".into()));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    rx: Receiver<Vec<i16>>,
    shared: Arc<Shared>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<i16> + Send + 'static,
{
    let mut chunk: Vec<i16> = Vec::new();
    let mut pos = 0usize;

    let err_fn = |e: cpal::StreamError| log::error!(target: "audio::cpal", "stream error: {e}");

    device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                let mut i = 0;
                while i < output.len() {
                    if pos >= chunk.len() {
                        match rx.try_recv() {
                            Ok(next) => {
                                chunk = next;
                                pos = 0;
                                continue;
                            }
                            Err(_) => {
                                if shared.active.load(Ordering::Acquire) {
                                    shared.underruns.fetch_add(1, Ordering::Relaxed);
                                }
                                output[i..].fill(T::EQUILIBRIUM);
                                return;
                            }
                        }
                    }
                    let n = (chunk.len() - pos).min(output.len() - i);
                    for (dst, &s) in output[i..i + n].iter_mut().zip(&chunk[pos..pos + n]) {
                        *dst = T::from_sample(s);
                    }
                    pos += n;
                    i += n;
                    shared.pending.fetch_sub(n, Ordering::AcqRel);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}
