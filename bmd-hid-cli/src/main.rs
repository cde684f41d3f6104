use anyhow::{Context, Result};
use bmd_hid_lib::leds::LedState;
use bmd_hid_lib::modes::{CutMode, JogSelector};
use bmd_hid_lib::types::{JogMode, Key};
use bmd_hid_lib::{ControlSurface, DeviceIdentity, SessionBuilder, SessionConfig, SurfaceHandler, UsbHidTransport};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Connects to a Blackmagic editing keyboard, lights the keys you press and
/// logs jog wheel and battery reports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial number of the unit to open when several are connected.
    #[arg(short, long)]
    serial: Option<String>,
    /// Open the full size editor keyboard instead of the Speed Editor.
    #[arg(long)]
    keyboard: bool,
    /// Handshake deadline in milliseconds.
    #[arg(long, default_value_t = 2000)]
    auth_timeout_ms: u64,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(verbosity: &Verbosity<InfoLevel>) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .without_time();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry().with(filter).with(console_layer).init();
}

/// Mirrors held keys on their LEDs and keeps the jog and cut groups exclusive.
struct Mirror {
    selector: JogSelector,
    cut: CutMode,
    pending_selector: Option<JogSelector>,
}

impl Mirror {
    fn new() -> Self {
        Self {
            selector: JogSelector::Jog,
            cut: CutMode::Cut,
            pending_selector: None,
        }
    }
}

impl SurfaceHandler for Mirror {
    fn on_jog(&mut self, _leds: &mut LedState, mode: JogMode, value: i32) {
        info!("{} wheel: {} ({})", self.selector, value, mode);
    }

    fn on_key_down(&mut self, leds: &mut LedState, key: Key) {
        info!("Key down: {}", key);

        if let Some(selector) = JogSelector::from_key(key) {
            self.selector = selector;
            self.pending_selector = Some(selector);
            leds.off(JogSelector::leds());
            leds.on(selector.led());
        } else if let Some(cut) = CutMode::from_key(key) {
            self.cut = cut;
            leds.off(CutMode::leds());
            leds.on(cut.led());
        } else if let Some(led) = key.led() {
            leds.on(led);
        }
    }

    fn on_key_up(&mut self, leds: &mut LedState, key: Key) {
        info!("Key up: {}", key);

        // Group LEDs stay lit to show the active choice.
        if JogSelector::from_key(key).is_some() || CutMode::from_key(key).is_some() {
            return;
        }
        if let Some(led) = key.led() {
            leds.off(led);
        }
    }

    fn on_battery(&mut self, _leds: &mut LedState, charging: bool, level: u8) {
        info!("Battery {}%{}", level, if charging { ", charging" } else { "" });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut identity = if cli.keyboard {
        DeviceIdentity::EDITOR_KEYBOARD
    } else {
        DeviceIdentity::SPEED_EDITOR
    };
    if let Some(serial) = cli.serial {
        identity = identity.with_serial(serial);
    }

    let config = SessionConfig {
        auth_timeout: Duration::from_millis(cli.auth_timeout_ms),
        ..SessionConfig::default()
    };
    let session = SessionBuilder::new()
        .config(config)
        .on_close(|| info!("Device session closed"))
        .open::<UsbHidTransport>(&identity)
        .await
        .with_context(|| format!("Failed to open {:04x}:{:04x}", identity.vendor_id, identity.product_id))?;
    info!("Connected, session valid for {}s", session.validity());

    let mut surface = ControlSurface::new(session, Mirror::new());
    let initial = surface.handler().selector;
    let cut = surface.handler().cut;
    surface.set_jog_mode(initial.mode()).await?;
    surface
        .update_leds(|leds| {
            leds.set(initial.led());
            leds.set(cut.led());
        })
        .await?;

    info!("Listening for input, press Ctrl+C to quit");
    let result = event_loop(&mut surface).await;
    surface.close().await;
    result
}

async fn event_loop(surface: &mut ControlSurface<UsbHidTransport, Mirror>) -> Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing device");
                return Ok(());
            }
            polled = surface.poll(None) => {
                polled.context("Device session failed")?;
            }
        }

        if let Some(selector) = surface.handler_mut().pending_selector.take() {
            if let Err(e) = surface.set_jog_mode(selector.mode()).await {
                warn!("Could not switch jog mode: {}", e);
                return Err(e.into());
            }
        }
    }
}
