use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use stream_captor::logging::init_logging;
use stream_captor::{
    acquire_mixed, AudioMixer, CaptureLogger, Config, Error, PcmEngine, RecordingSession,
    SyntheticCapture,
};
use tracing::{info, warn};

/// Record a synthetic screen share with a mixed microphone into one file
#[derive(Parser, Debug)]
#[command(name = "stream-captor", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/stream-captor")]
    config: String,

    /// How long to record
    #[arg(long, default_value_t = 3)]
    seconds: u64,

    /// Simulate a refused microphone prompt
    #[arg(long)]
    deny_microphone: bool,

    /// Pause halfway through for this many milliseconds
    #[arg(long)]
    pause_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = Config::load(&args.config)?;
    init_logging(&cfg.logging);

    info!("stream-captor v{}", env!("CARGO_PKG_VERSION"));
    info!("Audio: {}, output dir: {}", cfg.audio_format(), cfg.output.dir.display());

    let logger = CaptureLogger::tracing();
    let source = SyntheticCapture::new(cfg.audio_format(), cfg.audio.frame_ms)
        .deny_microphone(args.deny_microphone);
    let mixer = AudioMixer::new(cfg.mixer_config(), logger.clone());

    let aggregate = match acquire_mixed(&source, &mixer, &logger).await {
        Ok(aggregate) => aggregate,
        Err(Error::Acquisition(e)) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut session = RecordingSession::new(
        aggregate.stream().clone(),
        cfg.recorder_options(),
        logger.clone(),
        PcmEngine::open,
    )?;

    session.start();

    let total = Duration::from_secs(args.seconds);
    match args.pause_ms {
        Some(pause_ms) => {
            tokio::time::sleep(total / 2).await;
            session.pause();
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            session.resume();
            tokio::time::sleep(total - total / 2).await;
        }
        None => tokio::time::sleep(total).await,
    }

    let artifact = session.stop().await?;
    let stats = session.stats();
    info!(
        "Recorded {:.1}s in {} segments ({} bytes, {})",
        stats.duration_secs,
        stats.segment_count,
        artifact.len(),
        artifact.mime_type()
    );

    if artifact.is_empty() {
        warn!("Recording is empty; nothing to save");
    } else {
        let path = artifact
            .save(&cfg.output.dir)
            .with_context(|| format!("saving recording to {}", cfg.output.dir.display()))?;
        info!("Saved {}", path.display());
    }

    let stopped = aggregate.stop();
    info!("Stopped {} capture tracks", stopped);

    Ok(())
}
