//! chiptune: play, render and manage GB-style chiptune songs.

use std::error::Error;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use chiptune_engine::presets::SONG_VOLUME;
use chiptune_engine::tones::{SIDETONE_HZ, SIDETONE_VOLUME};
use chiptune_engine::realtime::{list_output_devices, DeviceOptions};
use chiptune_engine::{
    load_song, play_mono16_stream, save_song, spawn_playback, spawn_tone, AudioSink, BootSound, CpalSink,
    FileStore, PatternStream, Song, SongSlot, SoundSettings, WavSink,
};

#[derive(Parser)]
#[command(name = "chiptune")]
#[command(version, about = "Game Boy style chiptune player", long_about = None)]
struct Cli {
    /// Song slot + settings store (TOML). Defaults to <config dir>/chiptune/store.toml
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Play a saved slot (1-3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3), conflicts_with_all = ["song", "preset"])]
    slot: Option<u8>,

    /// Play an inline song: "tempo=..;d2=..;ns=..;p1=..;p2=..;nz=..;"
    #[arg(long, conflicts_with = "preset")]
    song: Option<String>,

    /// Boot sound: cute, majestic, gb, song1..song3 (default gb)
    #[arg(long)]
    preset: Option<BootSound>,

    /// Render voice 1 as a sine instead of a pulse
    #[arg(long)]
    sine: bool,
}

#[derive(Args)]
struct DeviceArgs {
    /// Output device name (see `chiptune devices`)
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    channels: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio output devices
    Devices,

    /// Play through an audio device
    Play {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        device: DeviceArgs,

        /// 0.0-1.0, scaled by the stored master volume
        #[arg(long)]
        volume: Option<f32>,
    },

    /// Hold a key sidetone. Without --ms, reads `<hz> [volume]` lines to
    /// retune and stops on an empty line or EOF
    Tone {
        #[arg(long, default_value_t = SIDETONE_HZ)]
        freq: f32,

        #[arg(long, default_value_t = SIDETONE_VOLUME)]
        volume: f32,

        /// Stop after this many milliseconds
        #[arg(long)]
        ms: Option<u64>,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Render to a 16-bit WAV file
    Render {
        /// Output .wav path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, default_value_t = 22_050)]
        sample_rate: u32,

        #[arg(long, default_value_t = 1)]
        channels: u16,

        #[arg(long)]
        volume: Option<f32>,
    },

    /// Store a song string in a slot
    Save {
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        slot: u8,

        /// Song string; missing or bad fields fall back to defaults
        song: String,
    },

    /// Print saved songs
    Show {
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        slot: Option<u8>,
    },

    /// Show or change the sound switch and master volume
    Settings {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,

        #[arg(long)]
        volume: Option<f32>,
    },
}

enum Source {
    Boot(BootSound),
    Song { song: Song, ch1_sine: bool },
}

impl Source {
    fn default_volume(&self) -> f32 {
        match self {
            Source::Boot(sound) => sound.default_volume(),
            Source::Song { .. } => SONG_VOLUME,
        }
    }

    fn describe(&self) -> String {
        match self {
            Source::Boot(sound) => format!("boot sound {sound}"),
            Source::Song { song, .. } => format!("song at {} bpm", song.tempo),
        }
    }
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn store_path(cli: &Cli) -> PathBuf {
    cli.store.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chiptune")
            .join("store.toml")
    })
}

fn slot(n: u8) -> Result<SongSlot, Box<dyn Error>> {
    SongSlot::new(n).ok_or_else(|| format!("slot must be 1-3, got {n}").into())
}

fn resolve_source(args: &SourceArgs, store: &FileStore) -> Result<Source, Box<dyn Error>> {
    if let Some(sound) = args.preset {
        return Ok(Source::Boot(sound));
    }
    if let Some(text) = &args.song {
        return Ok(Source::Song { song: Song::parse(text), ch1_sine: args.sine });
    }
    if let Some(n) = args.slot {
        let song = load_song(store, slot(n)?).ok_or_else(|| format!("slot {n} is empty"))?;
        return Ok(Source::Song { song, ch1_sine: args.sine });
    }
    Ok(Source::Boot(BootSound::Gb))
}

fn play(
    store: &FileStore,
    source: Source,
    device: DeviceArgs,
    volume: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let settings = SoundSettings::load(store);
    if !settings.enabled() {
        println!("Sound is disabled (chiptune settings --enable)");
        return Ok(());
    }
    let volume = settings.apply(volume.unwrap_or_else(|| source.default_volume()));
    let opts = DeviceOptions {
        device_name: device.device,
        sample_rate: device.sample_rate,
        channels: device.channels,
    };

    println!("Playing {} (volume {volume:.2})", source.describe());

    match source {
        Source::Boot(sound) => {
            let mut sink = CpalSink::open(&opts)?;
            sound.play(&mut sink, store, volume)?;
            sink.flush()?;
        }
        Source::Song { song, ch1_sine } => {
            let handle = spawn_playback(move || CpalSink::open(&opts), song, volume, ch1_sine)?;
            let mut last = None;
            while !handle.is_finished() {
                let step = handle.playhead();
                if step != last {
                    log::debug!(target: "audio::player", "step {:?}", step);
                    last = step;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            let report = handle.join()?;
            log::debug!(target: "audio::player", "{} frames played", report.frames_played);
        }
    }
    Ok(())
}

fn tone(
    store: &FileStore,
    freq: f32,
    volume: f32,
    ms: Option<u64>,
    device: DeviceArgs,
) -> Result<(), Box<dyn Error>> {
    let settings = SoundSettings::load(store);
    if !settings.enabled() {
        println!("Sound is disabled (chiptune settings --enable)");
        return Ok(());
    }
    let opts = DeviceOptions {
        device_name: device.device,
        sample_rate: device.sample_rate,
        channels: device.channels,
    };
    let handle = spawn_tone(move || CpalSink::open(&opts), freq, settings.apply(volume))?;

    match ms {
        Some(ms) => std::thread::sleep(Duration::from_millis(ms)),
        None => {
            println!("Sidetone at {freq} Hz; `<hz> [volume]` retunes, empty line stops");
            let mut volume = volume;
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                let mut parts = line.split_whitespace();
                let Some(hz) = parts.next() else { break };
                let Ok(hz) = hz.parse::<f32>() else {
                    eprintln!("not a frequency: {hz}");
                    continue;
                };
                if let Some(v) = parts.next().and_then(|v| v.parse::<f32>().ok()) {
                    volume = v;
                }
                handle.set(hz, settings.apply(volume));
            }
        }
    }

    let frames = handle.stop()?;
    log::debug!(target: "audio::player", "sidetone played {frames} frames");
    Ok(())
}

fn render(
    store: &FileStore,
    source: Source,
    output: PathBuf,
    sample_rate: u32,
    channels: u16,
    volume: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let volume = volume.unwrap_or_else(|| source.default_volume());
    let mut wav = WavSink::create(&output, sample_rate, channels)?;

    match source {
        Source::Boot(sound) => {
            sound.play(&mut wav, store, volume)?;
        }
        Source::Song { song, ch1_sine } => {
            let mut stream = PatternStream::new(sample_rate, song, ch1_sine);
            let total = stream.total_samples();
            play_mono16_stream(&mut wav, total, volume, None, &mut stream)?;
        }
    }

    let frames = wav.frames();
    wav.finalize()?;
    println!("Wrote {frames} frames @ {sample_rate} Hz to {}", output.display());
    Ok(())
}

fn show(store: &FileStore, only: Option<u8>) -> Result<(), Box<dyn Error>> {
    let slots: Vec<SongSlot> = match only {
        Some(n) => vec![slot(n)?],
        None => SongSlot::all().collect(),
    };
    for s in slots {
        match load_song(store, s) {
            Some(song) => println!("{}: {song}", s.key()),
            None => println!("{}: (empty)", s.key()),
        }
    }
    Ok(())
}

fn settings(
    store: &mut FileStore,
    enable: bool,
    disable: bool,
    volume: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let mut s = SoundSettings::load(store);
    if enable || disable {
        s.set_enabled(store, enable, true)?;
    }
    if let Some(v) = volume {
        s.set_volume(store, v, true)?;
    }
    println!(
        "sound: {}  volume: {:.3}",
        if s.enabled() { "on" } else { "off" },
        s.volume()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = store_path(&cli);

    match cli.command {
        Commands::Devices => {
            println!("Available output devices:");
            for name in list_output_devices()? {
                println!("- {name}");
            }
        }
        Commands::Play { source, device, volume } => {
            let store = FileStore::open(&path)?;
            let source = resolve_source(&source, &store)?;
            play(&store, source, device, volume)?;
        }
        Commands::Tone { freq, volume, ms, device } => {
            let store = FileStore::open(&path)?;
            tone(&store, freq, volume, ms, device)?;
        }
        Commands::Render { output, source, sample_rate, channels, volume } => {
            let store = FileStore::open(&path)?;
            let source = resolve_source(&source, &store)?;
            render(&store, source, output, sample_rate, channels, volume)?;
        }
        Commands::Save { slot: n, song } => {
            let mut store = FileStore::open(&path)?;
            let song = Song::parse(&song);
            save_song(&mut store, slot(n)?, &song)?;
            println!("song{n}: {song}");
        }
        Commands::Show { slot } => {
            let store = FileStore::open(&path)?;
            show(&store, slot)?;
        }
        Commands::Settings { enable, disable, volume } => {
            let mut store = FileStore::open(&path)?;
            settings(&mut store, enable, disable, volume)?;
        }
    }
    Ok(())
}
