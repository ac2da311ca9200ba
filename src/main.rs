use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use video_recorder::capture::DeviceKind;
use video_recorder::playback::FfplayFactory;
use video_recorder::{
    CameraScreen, CaptureBackend, Config, DeviceSelector, Facing, FfmpegSink, GesturePhase,
    RecorderEvent, ScreenDeps, StaticPermissions, VirtualBackend,
};

#[derive(Parser)]
#[command(name = "video-recorder", version, about = "Record a clip and play it straight back")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/video-recorder")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture devices
    Devices {
        #[arg(long)]
        json: bool,
    },
    /// Show which devices setup would pick
    Resolve {
        /// Look up the front camera instead of the back one
        #[arg(long)]
        front: bool,
    },
    /// Record clips and play each one back
    Record {
        /// Length of each take
        #[arg(long, default_value_t = 3)]
        seconds: u64,
        /// Number of takes
        #[arg(long, default_value_t = 1)]
        takes: u32,
        /// Record video only
        #[arg(long)]
        no_audio: bool,
        /// Don't present finished takes
        #[arg(long)]
        no_playback: bool,
        /// Replay the last take once more before leaving
        #[arg(long)]
        replay: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    let backend: Arc<dyn CaptureBackend> = Arc::new(if cfg.virtual_devices.is_empty() {
        VirtualBackend::phone().with_frame_rate(cfg.encoder.frame_rate)
    } else {
        VirtualBackend::from_config(&cfg.virtual_devices).with_frame_rate(cfg.encoder.frame_rate)
    });

    match cli.command {
        Command::Devices { json } => list_devices(backend.as_ref(), json),
        Command::Resolve { front } => resolve(backend.as_ref(), &cfg, front),
        Command::Record {
            seconds,
            takes,
            no_audio,
            no_playback,
            replay,
        } => {
            let mut cfg = cfg;
            if no_audio {
                cfg.capture.include_audio = false;
            }
            if no_playback {
                cfg.playback.enabled = false;
            }
            record(backend, cfg, Duration::from_secs(seconds), takes, replay).await
        }
    }
}

fn list_devices(backend: &dyn CaptureBackend, json: bool) -> Result<()> {
    let devices = backend.devices();

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    for device in &devices {
        println!(
            "{:<20} {:<10} {:<10} {:<6} {}{}",
            device.id,
            device.kind.to_string(),
            device.lens.map(|l| format!("{:?}", l)).unwrap_or_default(),
            device.facing.map(|f| format!("{:?}", f)).unwrap_or_default(),
            device.name,
            if device.can_open() { "" } else { " (unavailable)" }
        );
    }
    Ok(())
}

fn resolve(backend: &dyn CaptureBackend, cfg: &Config, front: bool) -> Result<()> {
    let selector = DeviceSelector::new(backend);
    let facing = if front { Facing::Front } else { Facing::Back };

    match selector.resolve_camera(facing, &cfg.capture.preferred_lenses) {
        Ok(camera) => println!("camera:     {} ({})", camera.name, camera.id),
        Err(e) => println!("camera:     {}", e),
    }
    match selector.resolve(DeviceKind::Microphone, &[]) {
        Ok(mic) => println!("microphone: {} ({})", mic.name, mic.id),
        Err(e) => println!("microphone: {}", e),
    }
    Ok(())
}

async fn record(
    backend: Arc<dyn CaptureBackend>,
    cfg: Config,
    take_length: Duration,
    takes: u32,
    replay: bool,
) -> Result<()> {
    let deps = ScreenDeps {
        backend,
        sink: Arc::new(FfmpegSink::new(cfg.encoder.ffmpeg.clone())),
        players: Arc::new(FfplayFactory::new(cfg.encoder.ffplay.clone())),
        permissions: Arc::new(StaticPermissions::new(cfg.permission.status)),
    };

    // Ctrl-C dismisses the screen
    let (dismiss_tx, dismissed) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = dismiss_tx.send(true);
        }
    });

    let mut screen = CameraScreen::open(deps, cfg.screen_config(), dismissed.clone())
        .await
        .context("Camera setup failed")?;

    // Finalizers are awaited on every exit path
    let result = run_takes(&mut screen, &dismissed, take_length, takes, replay).await;
    let teardown = screen.teardown().await;
    result?;
    teardown?;
    Ok(())
}

async fn run_takes(
    screen: &mut CameraScreen,
    dismissed: &watch::Receiver<bool>,
    take_length: Duration,
    takes: u32,
    replay: bool,
) -> Result<()> {
    screen.appear().await?;

    for take in 1..=takes {
        if *dismissed.borrow() {
            break;
        }

        info!("Take {}/{}", take, takes);
        screen.toggle_record().await?;
        tokio::time::sleep(take_length).await;
        // A failed writer already ended the take
        if screen.is_recording() {
            screen.toggle_record().await?;
        }

        match screen.wait_finished().await {
            Some(RecorderEvent::RecordingFinished {
                artifact,
                error: None,
            }) => println!("{}", artifact.path.display()),
            Some(RecorderEvent::RecordingFinished {
                error: Some(e), ..
            }) => bail!("Recording failed: {}", e),
            _ => break,
        }
    }

    if replay {
        tokio::time::sleep(take_length).await;
        screen.tap(GesturePhase::Ended).await?;
        tokio::time::sleep(take_length).await;
    }

    screen.disappear().await?;
    Ok(())
}
