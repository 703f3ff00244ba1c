//! sapphire CLI: plays a built-in demo through the default audio device or
//! renders it to a WAV file.
//!
//! Usage:
//!   cargo run --bin sp-cli
//!   cargo run --bin sp-cli -- --engine sdat --wav demo.wav
//!   cargo run --bin sp-cli -- --sample lead.bin --record take.wav

use anyhow::{bail, Context, Result};
use log::info;
use sp_master::{
    load_mp2k_wave, load_swav, Adsr, Command, DutyCycle, Engine, EngineConfig, Instrument,
    Interpolation, Lfo, LfoTarget, NoiseWidth, Player, Sample, ScriptedSequencer, VoiceKind,
};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

const USAGE: &str = "Usage: sp-cli [--engine mp2k|alphadream|sdat] [--rate HZ] [--linear] \
                     [--sample FILE] [--wav OUT.wav | --record OUT.wav] [--seconds N]";

struct Options {
    config: EngineConfig,
    sample: Option<String>,
    wav: Option<String>,
    record: Option<String>,
    seconds: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = parse_args(env::args().skip(1).collect())?;

    let mut engine = Engine::new(opts.config.clone());
    let lead = match &opts.sample {
        Some(path) => load_sample(path)?,
        None => demo_lead(),
    };
    let lead = engine.add_sample(lead);
    let sequencer = demo_song(lead);
    info!(
        "{:?} engine, {} ticks of music",
        opts.config.kind,
        sequencer.last_tick()
    );

    let mut player = Player::new(engine, sequencer);
    match &opts.wav {
        Some(path) => {
            let frames = player.render_to_wav(path, opts.seconds)?;
            println!("Rendered {frames} frames to {path}");
        }
        None => play(&mut player, &opts)?,
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Options> {
    let mut opts = Options {
        config: EngineConfig::mp2k(),
        sample: None,
        wav: None,
        record: None,
        seconds: 60,
    };
    let mut rate = None;
    let mut linear = false;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().with_context(|| format!("{arg} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--engine" => {
                opts.config = match value()?.as_str() {
                    "mp2k" => EngineConfig::mp2k(),
                    "alphadream" => EngineConfig::alpha_dream(),
                    "sdat" => EngineConfig::sdat(),
                    other => bail!("unknown engine {other:?}\n{USAGE}"),
                }
            }
            "--rate" => rate = Some(value()?.parse::<u32>().context("--rate")?),
            "--seconds" => opts.seconds = value()?.parse().context("--seconds")?,
            "--linear" => linear = true,
            "--sample" => opts.sample = Some(value()?),
            "--wav" => opts.wav = Some(value()?),
            "--record" => opts.record = Some(value()?),
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }
    if let Some(rate) = rate {
        opts.config = opts.config.with_sample_rate(rate);
    }
    if linear {
        opts.config = opts.config.with_interpolation(Interpolation::Linear);
    }
    Ok(opts)
}

/// Read a raw MP2K wave (header + data) or an NDS SWAV.
fn load_sample(path: &str) -> Result<Sample> {
    let data = fs::read(path).with_context(|| format!("failed to read {path}"))?;
    let name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sample");
    let is_swav = data.starts_with(b"SWAV") || path.to_ascii_lowercase().ends_with(".swav");
    let sample = if is_swav {
        load_swav(name, &data)
    } else {
        load_mp2k_wave(name, &data, false)
    };
    sample.with_context(|| format!("failed to parse {path}"))
}

fn play(player: &mut Player, opts: &Options) -> Result<()> {
    player.play()?;
    if let Some(path) = &opts.record {
        player.record_to_wav(path)?;
    }
    println!("Playing...");

    let limit = Duration::from_secs(opts.seconds as u64);
    let started = std::time::Instant::now();
    while player.is_playing() && started.elapsed() < limit {
        print!("\rTick: {:6}", player.ticks());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(20));
    }
    player.stop()?;
    if let Some(frames) = player.stop_recording()? {
        println!("\rRecorded {frames} frames");
    }
    println!("\rDone.          ");
    Ok(())
}

/// A looping 32-frame saw wave at middle C.
fn demo_lead() -> Sample {
    let saw = (0..32).map(|i| (i * 8 - 128) as i8).collect();
    Sample::pcm8("saw", saw, 8372).looping(0)
}

fn demo_song(lead: sp_master::SampleKey) -> ScriptedSequencer {
    let instruments = vec![
        Instrument::new("lead", VoiceKind::Pcm { sample: lead, fixed: false })
            .with_adsr(Adsr::new(0xFF, 0xF0, 0xC0, 0xE0)),
        Instrument::new("bass", VoiceKind::Square1 { duty: DutyCycle::Quarter, sweep: 0 })
            .with_adsr(Adsr::new(0, 2, 10, 2)),
        Instrument::new("hat", VoiceKind::Noise { width: NoiseWidth::Short })
            .with_adsr(Adsr::new(0, 1, 0, 0)),
        Instrument::new("pad", VoiceKind::Wave { pattern: PAD_WAVE })
            .with_adsr(Adsr::new(1, 0, 15, 3)),
    ];

    let mut seq = ScriptedSequencer::new(instruments)
        .at(0, Command::Volume { track: 0, volume: 110 })
        .at(0, Command::Pan { track: 3, pan: -20 })
        .at(0, Command::Lfo { track: 0, lfo: Lfo::new(12, 2, 24, LfoTarget::Pitch) });

    const LEAD: [u8; 8] = [72, 76, 79, 76, 74, 77, 81, 77];
    const BASS: [u8; 4] = [48, 45, 41, 43];
    const STEP: u32 = 12;

    for bar in 0..4u32 {
        let start = bar * STEP * 8;
        for (i, &note) in LEAD.iter().enumerate() {
            seq = seq.note(start + i as u32 * STEP, 0, 0, note, 100, STEP - 2);
        }
        seq = seq.note(start, 1, 1, BASS[bar as usize], 110, STEP * 7);
        seq = seq.note(start, 3, 3, BASS[bar as usize] + 12, 80, STEP * 8 - 4);
        for beat in 0..8 {
            seq = seq.note(start + beat * STEP + STEP / 2, 2, 2, 60, 60, 3);
        }
    }
    seq.at(4 * STEP * 8, Command::FadeOut { ms: 1500 })
}

/// 4-bit wave RAM for the pad: a soft triangle.
const PAD_WAVE: [u8; 16] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54, 0x32, 0x10,
];
