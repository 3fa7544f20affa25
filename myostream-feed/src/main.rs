//! Synthetic multi-channel signal feed.
//!
//! Connects to a running ingestion service and streams frames of known
//! waveforms at a fixed rate — sine with additive noise, cosine, square,
//! sawtooth, and harmonic mixes on the higher channels. Useful for
//! exercising the backend without acquisition hardware.

use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use anyhow::Context;
use myostream_core::{FrameCodec, SampleChunk};
use rand::Rng;
use tracing::info;

#[derive(Debug)]
struct Args {
    host: String,
    port: u16,
    channels: usize,
    samples: usize,
    rate_hz: f64,
    /// Stop after this many frames; `None` streams until the peer closes.
    frames: Option<u64>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 12_345,
            channels: 32,
            samples: 18,
            rate_hz: 20.0,
            frames: None,
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .ok_or_else(|| format!("missing value for {name}"))
        };
        match arg.as_str() {
            "--host" => args.host = value("--host")?,
            "--port" => {
                args.port = value("--port")?
                    .parse()
                    .map_err(|e| format!("invalid --port: {e}"))?;
            }
            "--channels" => {
                args.channels = value("--channels")?
                    .parse()
                    .map_err(|e| format!("invalid --channels: {e}"))?;
            }
            "--samples" => {
                args.samples = value("--samples")?
                    .parse()
                    .map_err(|e| format!("invalid --samples: {e}"))?;
            }
            "--rate" => {
                args.rate_hz = value("--rate")?
                    .parse()
                    .map_err(|e| format!("invalid --rate: {e}"))?;
            }
            "--frames" => {
                args.frames = Some(
                    value("--frames")?
                        .parse()
                        .map_err(|e| format!("invalid --frames: {e}"))?,
                );
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    if args.channels == 0 || args.samples == 0 {
        return Err("--channels and --samples must be positive".into());
    }
    if !(args.rate_hz.is_finite() && args.rate_hz > 0.0) {
        return Err("--rate must be a positive number of frames per second".into());
    }
    Ok(args)
}

fn print_usage() {
    eprintln!(
        "usage: myostream-feed [--host HOST] [--port PORT] [--channels N] \
         [--samples N] [--rate HZ] [--frames N]"
    );
}

/// Per-channel waveform at unitless time `t`.
fn waveform(channel: usize, t: f64, rng: &mut impl Rng) -> f32 {
    let value = match channel {
        0 => (t.sin() * 100.0) + rng.gen_range(-10.0..10.0),
        1 => (t * 0.5).cos() * 75.0,
        2 => {
            if (t * 2.0).sin() > 0.0 {
                50.0
            } else {
                -50.0
            }
        }
        3 => (t % std::f64::consts::TAU) / std::f64::consts::PI * 60.0 - 30.0,
        i => (t * (i as f64 + 1.0)).sin() * (100.0 / (i as f64 + 1.0)),
    };
    value as f32
}

fn run() -> anyhow::Result<()> {
    let args = parse_args().map_err(|e| {
        print_usage();
        anyhow::anyhow!(e)
    })?;

    let addr = format!("{}:{}", args.host, args.port);
    let mut stream = TcpStream::connect(&addr).with_context(|| format!("connecting to {addr}"))?;
    stream.set_nodelay(true).ok();
    info!(%addr, channels = args.channels, samples = args.samples, rate_hz = args.rate_hz, "streaming");

    let codec = FrameCodec::new(args.channels, args.samples);
    let period = Duration::from_secs_f64(1.0 / args.rate_hz);
    // Time advances per sample so waveforms are continuous across frames.
    let dt = 0.05f64;
    let mut rng = rand::thread_rng();
    let mut t = 0.0f64;
    let mut sent = 0u64;
    let mut next_deadline = Instant::now();

    loop {
        if args.frames.is_some_and(|n| sent >= n) {
            break;
        }

        let mut data = Vec::with_capacity(args.channels * args.samples);
        for channel in 0..args.channels {
            for s in 0..args.samples {
                data.push(waveform(channel, t + s as f64 * dt, &mut rng));
            }
        }
        t += args.samples as f64 * dt;

        let chunk = SampleChunk::new(args.channels, args.samples, data)
            .context("building frame")?;
        if let Err(e) = stream.write_all(&codec.encode(&chunk)) {
            info!("peer closed the stream: {e}");
            break;
        }
        sent += 1;

        next_deadline += period;
        if let Some(wait) = next_deadline.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }

    info!(sent, "feed finished");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("myostream-feed failed: {e:#}");
        std::process::exit(1);
    }
}
