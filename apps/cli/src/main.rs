use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use senso_core::{DeviceConfig, SensoDevice};
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_RECORDING: &str = "recordings/senso/zero.dat";

/// Locates the bundled recording next to the executable or, for builds run
/// from the source tree, at the workspace root. The working directory is
/// not consulted.
fn default_recording() -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    exe_dir
        .into_iter()
        .chain(std::iter::once(workspace))
        .map(|dir| dir.join(DEFAULT_RECORDING))
        .find(|path| path.is_file())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated Senso sensor device", long_about = None)]
struct Args {
    /// Recording replayed as sensor data
    recording: Option<PathBuf>,

    /// TOML config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start in Bootloader (DFU) mode
    #[arg(long)]
    dfu: bool,

    /// Firmware version reported to drivers (major.minor.patch)
    #[arg(long = "fw", value_name = "VERSION")]
    firmware: Option<String>,

    /// Play the recording once instead of looping
    #[arg(long)]
    no_loop: bool,

    /// Playback speed multiplier
    #[arg(long)]
    speed: Option<f64>,

    /// Control protocol TCP port
    #[arg(long)]
    control_port: Option<u16>,

    /// Firmware update UDP port
    #[arg(long)]
    update_port: Option<u16>,

    /// Delay between modes in milliseconds
    #[arg(long = "settle-ms", value_name = "MS")]
    settle_ms: Option<u64>,

    /// Do not publish discovery records
    #[arg(long)]
    no_advertise: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<DeviceConfig> {
        let mut config = match &self.config {
            Some(path) => DeviceConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DeviceConfig::default(),
        };

        config.start_in_dfu |= self.dfu;
        config.replay_loop &= !self.no_loop;
        config.advertise &= !self.no_advertise;
        if let Some(firmware) = self.firmware {
            config.firmware_version = firmware;
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        if let Some(port) = self.control_port {
            config.control_port = port;
        }
        if let Some(port) = self.update_port {
            config.update_port = port;
        }
        if let Some(ms) = self.settle_ms {
            config.settle_delay_ms = ms;
        }

        match self.recording {
            Some(path) => config.recording = Some(path),
            None if config.recording.is_none() => match default_recording() {
                Some(default) => config.recording = Some(default),
                None => warn!(path = DEFAULT_RECORDING, "Default recording not found"),
            },
            None => {}
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    info!(
        firmware = %config.firmware_version,
        dfu = config.start_in_dfu,
        "Starting mock Senso"
    );

    let device = SensoDevice::new(&config)?;
    let (stop, shutdown) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        stop.send_replace(true);
    });

    device.run(shutdown).await;
    Ok(())
}
