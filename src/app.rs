//! ogdar application.
//!
//! This module contains the top-level structure [`App`] that wires the
//! FPGA, the acquisition engine and the client surface together and runs
//! them until shutdown.

use crate::{
    acquire::{Capture, Engine, RingConfig, Timing},
    args::Args,
    config::{self, ConfigSource},
    fpga::Fpga,
    notify::Mailbox,
    sweep::SweepHandle,
};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;

/// The ogdar application: the acquisition engine plus its shutdown
/// signal and the capture surface handed to in-process clients.
pub struct App {
    engine: Engine<Fpga>,
    capture: Capture,
    shutdown: watch::Sender<bool>,
}

impl App {
    /// Loads configuration, opens the FPGA, and builds the engine.
    #[tracing::instrument(name = "App::new", level = "debug", skip_all)]
    pub async fn new(args: &Args) -> Result<App> {
        let (config, source) = config::load(args.config.as_deref());
        let fpga = if args.synthetic {
            Fpga::synthetic()?
        } else {
            Fpga::open()?
        };
        let (shutdown, shutdown_rx) = watch::channel(false);
        let timing = Timing {
            fire_timeout: Duration::from_millis(args.fire_timeout_ms),
            poll_interval: Duration::from_micros(args.poll_interval_us),
        };
        let (mut engine, capture) = Engine::new(fpga, RingConfig::default(), timing, shutdown_rx);
        if source == ConfigSource::Defaults {
            engine.mark_default_config();
        }
        engine.apply_config(&config);
        tracing::info!(
            model = %config.radar.model,
            prf = config.radar.prf,
            acps_per_rotation = config.radar.acps_per_rotation,
            "radar configured"
        );
        Ok(App {
            engine,
            capture,
            shutdown,
        })
    }

    /// The capture surface shared with in-process clients.
    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Runs the application until interrupted, then shuts the engine down
    /// cleanly.
    #[tracing::instrument(name = "App::run", level = "debug", skip_all)]
    pub async fn run(self) -> Result<()> {
        let App {
            engine,
            capture,
            shutdown,
        } = self;
        let reporter = tokio::spawn(report_sweeps(capture.subscribe_sweeps(), capture.clone()));
        let acquisition = tokio::spawn(engine.run());
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        tracing::info!("shutdown requested");
        let _ = shutdown.send(true);
        acquisition.await??;
        reporter.await?;
        Ok(())
    }
}

/// Logs each closed sweep; doubles as a liveness indicator for the
/// operator. Exits when the engine closes the mailbox.
async fn report_sweeps(mailbox: Mailbox<SweepHandle>, capture: Capture) {
    while let Some(handle) = mailbox.recv().await {
        match capture.get_sweep(handle) {
            Some(sweep) => tracing::info!(
                arp = sweep.arp,
                scanlines = sweep.n,
                uniform = sweep.uniform,
                "sweep"
            ),
            None => tracing::debug!("sweep notification went stale before it was read"),
        }
    }
    let stats = capture.stats();
    tracing::info!(
        pulses = stats.pulses_captured,
        dropped = stats.pulses_dropped,
        gaps = stats.trigger_gaps,
        timeouts = stats.fpga_timeouts,
        "capture summary"
    );
}
