//! Acquisition engine.
//!
//! One task drives the FPGA through its arm/fire cycle and is the sole
//! writer to the sample, scanline and sweep rings: apply any pending
//! parameter changes while the FPGA is idle, arm, wait for the capture to
//! complete, move the pulse into the rings, fold it into the open sweep,
//! and notify subscribers. Clients hold a [`Capture`] and read through
//! handles; they never block the loop.

use crate::buffer::{
    pack_extra, DecimMode, ScanlineData, ScanlineHandle, ScanlineMeta, ScanlineRing,
    ScanlineStore, SampleSpan, SAMPLE_RING_CAPACITY, SCANLINE_RING_CAPACITY, SWEEP_RING_CAPACITY,
};
use crate::fpga::{Digitizer, Options, PulseSnapshot, FAST_ADC_CLOCK_HZ};
use crate::notify::{Mailbox, NotificationBus};
use crate::sweep::{Sweep, SweepAccumulator, SweepHandle, SweepStore};
use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Ring capacities, fixed at engine construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RingConfig {
    /// Sample ring capacity, in samples.
    pub samples: usize,
    /// Scanline ring capacity, in scanlines.
    pub scanlines: usize,
    /// Sweep ring capacity, in sweeps.
    pub sweeps: usize,
}

impl Default for RingConfig {
    fn default() -> RingConfig {
        RingConfig {
            samples: SAMPLE_RING_CAPACITY,
            scanlines: SCANLINE_RING_CAPACITY,
            sweeps: SWEEP_RING_CAPACITY,
        }
    }
}

/// Loop timing knobs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Timing {
    /// How long to wait for the FPGA to report a capture before declaring
    /// it silent and re-arming.
    pub fire_timeout: Duration,
    /// Sleep between polls of the fired status.
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Timing {
        Timing {
            fire_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_micros(50),
        }
    }
}

/// A parameter write queued by a client, applied by the acquisition loop
/// in the quiescent window between pulses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterWrite {
    /// Schema name of the register.
    pub name: String,
    /// Value to write.
    pub value: u32,
}

#[derive(Debug, Default)]
struct Counters {
    pulses_captured: AtomicU64,
    pulses_dropped: AtomicU64,
    trigger_gaps: AtomicU64,
    fpga_timeouts: AtomicU64,
    unknown_registers: AtomicU64,
    samples_captured: AtomicU64,
    sweeps_closed: AtomicU64,
    default_config: AtomicBool,
}

/// Read-only snapshot of the engine's telemetry counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Pulses moved into the rings.
    pub pulses_captured: u64,
    /// Pulses dropped because the rings could not hold them.
    pub pulses_dropped: u64,
    /// Trigger pulses the FPGA reported between consecutive captures,
    /// summed over the run.
    pub trigger_gaps: u64,
    /// Arm cycles that timed out without a capture.
    pub fpga_timeouts: u64,
    /// Parameter writes naming no writable register.
    pub unknown_registers: u64,
    /// Samples allocated in the sample ring.
    pub samples_captured: u64,
    /// Sweeps closed.
    pub sweeps_closed: u64,
    /// True when the built-in default configuration is in use because no
    /// valid `ogdar.toml` was found.
    pub default_config: bool,
}

impl Counters {
    fn stats(&self) -> Stats {
        Stats {
            pulses_captured: self.pulses_captured.load(Ordering::Relaxed),
            pulses_dropped: self.pulses_dropped.load(Ordering::Relaxed),
            trigger_gaps: self.trigger_gaps.load(Ordering::Relaxed),
            fpga_timeouts: self.fpga_timeouts.load(Ordering::Relaxed),
            unknown_registers: self.unknown_registers.load(Ordering::Relaxed),
            samples_captured: self.samples_captured.load(Ordering::Relaxed),
            sweeps_closed: self.sweeps_closed.load(Ordering::Relaxed),
            default_config: self.default_config.load(Ordering::Relaxed),
        }
    }
}

/// Client-side surface of the capture pipeline. Cheap to clone; clones
/// share the rings, the notification bus and the parameter queue.
#[derive(Debug, Clone)]
pub struct Capture {
    scanlines: Arc<ScanlineStore>,
    sweeps: Arc<SweepStore>,
    bus: Arc<NotificationBus>,
    params: mpsc::UnboundedSender<ParameterWrite>,
    counters: Arc<Counters>,
}

impl Capture {
    /// Reads the scanline a handle refers to, or `None` if it is stale.
    pub fn get_scanline(&self, handle: ScanlineHandle) -> Option<ScanlineData> {
        self.scanlines.get(handle)
    }

    /// Checks a scanline handle in O(1).
    pub fn is_scanline_valid(&self, handle: ScanlineHandle) -> bool {
        self.scanlines.is_valid(handle)
    }

    /// Materializes the sweep a handle refers to, or `None` if it is
    /// stale.
    pub fn get_sweep(&self, handle: SweepHandle) -> Option<Sweep> {
        self.sweeps.get(handle)
    }

    /// Checks a sweep handle in O(1).
    pub fn is_sweep_valid(&self, handle: SweepHandle) -> bool {
        self.sweeps.is_valid(handle)
    }

    /// Subscribes to captured scanlines, optionally throttled to at most
    /// one delivery per `min_interval`.
    pub fn subscribe_pulses(&self, min_interval: Option<Duration>) -> Mailbox<ScanlineHandle> {
        self.bus.subscribe_pulses(min_interval)
    }

    /// Subscribes to sweep closes.
    pub fn subscribe_sweeps(&self) -> Mailbox<SweepHandle> {
        self.bus.subscribe_sweeps()
    }

    /// Queues a register write; the acquisition loop applies it between
    /// pulses, never mid-capture.
    pub fn write_parameter(&self, name: &str, value: u32) {
        let _ = self.params.send(ParameterWrite {
            name: name.to_string(),
            value,
        });
    }

    /// Telemetry counters.
    pub fn stats(&self) -> Stats {
        self.counters.stats()
    }
}

/// The acquisition engine: digitizer, rings, accumulator and bus.
pub struct Engine<D> {
    digitizer: D,
    scanlines: ScanlineRing,
    sweeps: SweepAccumulator,
    bus: Arc<NotificationBus>,
    params: mpsc::UnboundedReceiver<ParameterWrite>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
    timing: Timing,
    last_trig_count: Option<u32>,
}

enum Fire {
    Fired,
    Timeout,
    Shutdown,
}

impl<D: Digitizer> Engine<D> {
    /// Builds an engine over a digitizer, returning it together with the
    /// client capture surface.
    pub fn new(
        digitizer: D,
        rings: RingConfig,
        timing: Timing,
        shutdown: watch::Receiver<bool>,
    ) -> (Engine<D>, Capture) {
        let store = ScanlineStore::new(rings.samples, rings.scanlines);
        let sweep_store = SweepStore::new(rings.sweeps, rings.scanlines);
        let bus = Arc::new(NotificationBus::new());
        let counters = Arc::new(Counters::default());
        let (params_tx, params_rx) = mpsc::unbounded_channel();
        let capture = Capture {
            scanlines: Arc::clone(&store),
            sweeps: Arc::clone(&sweep_store),
            bus: Arc::clone(&bus),
            params: params_tx,
            counters: Arc::clone(&counters),
        };
        let engine = Engine {
            digitizer,
            scanlines: ScanlineRing::new(store),
            sweeps: SweepAccumulator::new(sweep_store),
            bus,
            params: params_rx,
            shutdown,
            counters,
            timing,
            last_trig_count: None,
        };
        (engine, capture)
    }

    /// Writes a configuration to the digitizer registers. Intended for
    /// startup, before the arm/fire cycle begins.
    pub fn apply_config(&mut self, config: &crate::config::Config) {
        for (name, value) in config.register_writes() {
            if !self.digitizer.apply(name, value) {
                self.counters.unknown_registers.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(name, "configuration names an unknown register");
            }
        }
    }

    /// Records that the built-in defaults are in use, for client
    /// telemetry.
    pub fn mark_default_config(&self) {
        self.counters.default_config.store(true, Ordering::Relaxed);
    }

    /// Runs the arm/fire/transfer loop until shutdown is signalled. On
    /// shutdown the in-flight capture is finished, every mailbox is
    /// closed, and the loop returns.
    #[tracing::instrument(name = "acquire", skip_all)]
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            scanline_capacity = self.scanlines.store().capacity(),
            sample_capacity = self.scanlines.store().arena().capacity(),
            "acquisition started"
        );
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.apply_pending_parameters();
            self.digitizer.arm();
            match self.wait_for_fire().await {
                Fire::Fired => self.service_pulse(),
                Fire::Timeout => {
                    self.counters.fpga_timeouts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        timeout_ms = self.timing.fire_timeout.as_millis() as u64,
                        "FPGA silent past timeout; re-arming"
                    );
                }
                Fire::Shutdown => break,
            }
        }
        self.bus.close();
        let stats = self.counters.stats();
        tracing::info!(
            pulses = stats.pulses_captured,
            dropped = stats.pulses_dropped,
            sweeps = stats.sweeps_closed,
            "acquisition stopped"
        );
        Ok(())
    }

    async fn wait_for_fire(&mut self) -> Fire {
        let deadline = tokio::time::Instant::now() + self.timing.fire_timeout;
        loop {
            if self.digitizer.has_fired() {
                return Fire::Fired;
            }
            if *self.shutdown.borrow() {
                return Fire::Shutdown;
            }
            if tokio::time::Instant::now() >= deadline {
                return Fire::Timeout;
            }
            tokio::time::sleep(self.timing.poll_interval).await;
        }
    }

    fn service_pulse(&mut self) {
        let snap = self.digitizer.snapshot();
        if let Some(prev) = self.last_trig_count {
            let delta = snap.trig_count.wrapping_sub(prev);
            if delta > 1 {
                self.counters
                    .trigger_gaps
                    .fetch_add((delta - 1) as u64, Ordering::Relaxed);
                tracing::debug!(missed = delta - 1, "trigger gap between captures");
            }
        }
        self.last_trig_count = Some(snap.trig_count);

        let n = snap.num_samp as usize;
        let Some((index, span)) = self.scanlines.alloc(n, snap.trig_count) else {
            self.counters.pulses_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(n, "pulse dropped: rings cannot hold it");
            return;
        };
        self.copy_samples(n, span);
        let meta = scanline_meta(&snap);
        self.scanlines.publish(index, meta, span);
        self.counters.pulses_captured.fetch_add(1, Ordering::Relaxed);
        self.counters
            .samples_captured
            .store(self.scanlines.total_samples(), Ordering::Relaxed);

        let handle = ScanlineHandle::new(index, snap.trig_count);
        let now_micros = Utc::now().timestamp_micros() as u64;
        if let Some(closed) = self.sweeps.on_scanline(handle, &meta, now_micros) {
            self.counters.sweeps_closed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                arp = closed.arp(),
                prf = estimate_prf(&snap),
                "sweep closed"
            );
            self.bus.publish_sweep(closed);
        }
        self.bus.publish_pulse(handle, Instant::now());
    }

    fn copy_samples(&mut self, n: usize, span: SampleSpan) {
        let store = Arc::clone(self.scanlines.store());
        let writer = store.writer(span);
        self.digitizer.read_video(n, &writer);
    }

    fn apply_pending_parameters(&mut self) {
        while let Ok(write) = self.params.try_recv() {
            if self.digitizer.apply(&write.name, write.value) {
                tracing::debug!(name = %write.name, value = write.value, "parameter applied");
            } else {
                self.counters
                    .unknown_registers
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(name = %write.name, "parameter write names an unknown register");
            }
        }
    }
}

fn scanline_meta(snap: &PulseSnapshot) -> ScanlineMeta {
    ScanlineMeta {
        arp_count: snap.arp_count,
        trig_clock: snap.trig_clock.wrapping_sub(snap.arp_clock) as u32,
        trig_count: snap.trig_count,
        acp_clock: pack_acp_clock(snap),
        decim_rate_m1: snap.dec_rate.saturating_sub(1) as u16,
        extra: pack_extra(decim_mode(snap), snap.trig_delay as u16),
    }
}

/// Bits 31:20: ACPs since the last ARP; bits 19:0: ADC ticks since the
/// last ACP.
fn pack_acp_clock(snap: &PulseSnapshot) -> u32 {
    let acps = snap.acp_count.wrapping_sub(snap.acp_at_arp) & 0xfff;
    let ticks = snap.trig_clock.wrapping_sub(snap.acp_clock) as u32 & 0xf_ffff;
    (acps << 20) | ticks
}

fn decim_mode(snap: &PulseSnapshot) -> DecimMode {
    let options = Options(snap.options);
    if options.sum() && snap.dec_rate <= 4 {
        DecimMode::Sum
    } else if options.average() {
        DecimMode::Average
    } else {
        DecimMode::PickNth
    }
}

fn estimate_prf(snap: &PulseSnapshot) -> f64 {
    let interval = snap.trig_clock.wrapping_sub(snap.trig_prev_clock);
    if interval == 0 {
        0.0
    } else {
        f64::from(FAST_ADC_CLOCK_HZ) / interval as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::{SampleWriter, NOT_A_SAMPLE};
    use crate::regs::Schema;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Synthetic digitizer: arming consumes one pending pulse, if any, and
    /// reports it as fired. Register writes land in a plain map.
    #[derive(Debug, Default)]
    struct SimState {
        regs: Mutex<HashMap<String, u32>>,
        pending: Mutex<u32>,
        gap_next: Mutex<u32>,
        fired: AtomicBool,
        trig_count: AtomicU64,
        arp_count: AtomicU64,
        pulses_per_arp: u32,
    }

    #[derive(Debug)]
    struct SimDigitizer {
        state: Arc<SimState>,
    }

    impl SimState {
        fn with(num_samp: u32, pulses_per_arp: u32) -> Arc<SimState> {
            let state = SimState {
                pulses_per_arp,
                ..SimState::default()
            };
            state.regs.lock().unwrap().insert("num_samp".into(), num_samp);
            state.regs.lock().unwrap().insert("dec_rate".into(), 1);
            Arc::new(state)
        }

        fn add_pulses(&self, n: u32) {
            *self.pending.lock().unwrap() += n;
        }

        fn set_gap(&self, n: u32) {
            *self.gap_next.lock().unwrap() = n;
        }

        fn reg(&self, name: &str) -> u32 {
            self.regs.lock().unwrap().get(name).copied().unwrap_or(0)
        }
    }

    impl Digitizer for SimDigitizer {
        fn apply(&mut self, name: &str, value: u32) -> bool {
            match Schema::digdar().lookup(name) {
                Some(reg) if reg.writable() => {
                    self.state
                        .regs
                        .lock()
                        .unwrap()
                        .insert(name.to_string(), value);
                    true
                }
                _ => false,
            }
        }

        fn arm(&mut self) {
            let mut pending = self.state.pending.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                let gap = std::mem::take(&mut *self.state.gap_next.lock().unwrap());
                let count = self
                    .state
                    .trig_count
                    .fetch_add(1 + gap as u64, Ordering::Relaxed)
                    + 1
                    + gap as u64;
                if self.state.pulses_per_arp > 0 {
                    self.state.arp_count.store(
                        count / self.state.pulses_per_arp as u64,
                        Ordering::Relaxed,
                    );
                }
                self.state.fired.store(true, Ordering::Relaxed);
            } else {
                self.state.fired.store(false, Ordering::Relaxed);
            }
        }

        fn reset(&mut self) {}

        fn has_fired(&self) -> bool {
            self.state.fired.load(Ordering::Relaxed)
        }

        fn snapshot(&self) -> PulseSnapshot {
            let trig_count = self.state.trig_count.load(Ordering::Relaxed);
            PulseSnapshot {
                trig_count: trig_count as u32,
                trig_clock: trig_count * 59_524, // ~2.1 kHz at 125 MHz
                trig_prev_clock: (trig_count - 1) * 59_524,
                acp_count: trig_count as u32 / 5,
                acp_clock: trig_count * 59_524 - 1000,
                arp_count: self.state.arp_count.load(Ordering::Relaxed) as u32,
                arp_clock: 1,
                acp_per_arp: 450,
                acp_at_arp: 0,
                trig_at_arp: 0,
                num_samp: self.state.reg("num_samp"),
                dec_rate: self.state.reg("dec_rate"),
                trig_delay: self.state.reg("trig_delay"),
                options: self.state.reg("options"),
            }
        }

        fn read_video(&self, n: usize, dst: &SampleWriter<'_>) {
            for i in 0..n.min(dst.len()) {
                dst.write(i, 0x100 + i as u16);
            }
        }
    }

    fn small_rings() -> RingConfig {
        RingConfig {
            samples: 4096,
            scanlines: 64,
            sweeps: 5,
        }
    }

    fn fast_timing() -> Timing {
        Timing {
            fire_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_micros(10),
        }
    }

    fn start_engine(
        state: &Arc<SimState>,
        rings: RingConfig,
    ) -> (
        Capture,
        watch::Sender<bool>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let digitizer = SimDigitizer {
            state: Arc::clone(state),
        };
        let (engine, capture) = Engine::new(digitizer, rings, fast_timing(), shutdown_rx);
        let task = tokio::spawn(engine.run());
        (capture, shutdown_tx, task)
    }

    async fn stop(shutdown: watch::Sender<bool>, task: tokio::task::JoinHandle<Result<()>>) {
        let _ = shutdown.send(true);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_pulse_lands_in_the_rings() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        state.add_pulses(1);
        let handle = pulses.recv().await.unwrap();
        assert!(capture.is_scanline_valid(handle));
        let data = capture.get_scanline(handle).unwrap();
        assert_eq!(data.samples, vec![0x100, 0x101, 0x102, 0x103]);
        assert_eq!(data.meta.trig_count, 1);
        assert_eq!(data.meta.serial(), handle.serial());
        assert_eq!(data.meta.decim_rate_m1, 0);
        // the fingerprint precedes the echo samples in the arena
        let raw = capture.scanlines.get(handle).unwrap();
        assert_eq!(raw.meta, data.meta);
        let stats = capture.stats();
        assert_eq!(stats.pulses_captured, 1);
        assert_eq!(stats.pulses_dropped, 0);
        assert_eq!(stats.samples_captured, 6);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fingerprint_is_present_at_publication() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        state.add_pulses(1);
        let handle = pulses.recv().await.unwrap();
        let arena = capture.scanlines.arena();
        // the first span starts at slot 0
        assert_eq!(arena.get(0), NOT_A_SAMPLE);
        assert_eq!(arena.get(1), handle.serial());
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_closes_after_arp_transition() {
        let state = SimState::with(4, 10);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let sweeps = capture.subscribe_sweeps();
        state.add_pulses(12);
        let closed = sweeps.recv().await.unwrap();
        let sweep = capture.get_sweep(closed).unwrap();
        // trigger counts 1..=9 share ARP 0; count 10 starts the next sweep
        assert_eq!(sweep.arp, 0);
        assert_eq!(sweep.n, 9);
        assert!(sweep.uniform);
        assert_eq!(sweep.lines2, 0..0);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn parameter_writes_apply_between_pulses() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        state.add_pulses(1);

        let first = pulses.recv().await.unwrap();
        let before = capture.get_scanline(first).unwrap();
        assert_eq!(before.meta.decim_rate_m1, 0);

        capture.write_parameter("dec_rate", 2);
        state.add_pulses(1);
        let second = pulses.recv().await.unwrap();
        let after = capture.get_scanline(second).unwrap();
        // the queued write took effect before the next capture, not mid-pulse
        assert_eq!(after.meta.decim_rate_m1, 1);
        assert_eq!(state.reg("dec_rate"), 2);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_parameter_counts_instead_of_applying() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        capture.write_parameter("not_a_register", 1);
        state.add_pulses(1);
        pulses.recv().await.unwrap();
        assert_eq!(capture.stats().unknown_registers, 1);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_pulse_is_dropped_not_fatal() {
        let state = SimState::with(4, 0);
        state.add_pulses(2);
        let rings = RingConfig {
            samples: 4, // too small for 4 samples + fingerprint
            scanlines: 8,
            sweeps: 5,
        };
        let (capture, shutdown, task) = start_engine(&state, rings);
        while capture.stats().pulses_dropped < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(capture.stats().pulses_captured, 0);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_gaps_are_accounted() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        state.add_pulses(1);
        pulses.recv().await.unwrap();
        state.set_gap(3);
        state.add_pulses(1);
        pulses.recv().await.unwrap();
        assert_eq!(capture.stats().trigger_gaps, 3);
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn silent_fpga_times_out_and_rearms() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        while capture.stats().fpga_timeouts < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // liveness: a pulse arriving after the timeouts is still captured
        state.add_pulses(1);
        let pulses = capture.subscribe_pulses(None);
        pulses.recv().await.unwrap();
        stop(shutdown, task).await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_mailboxes() {
        let state = SimState::with(4, 0);
        let (capture, shutdown, task) = start_engine(&state, small_rings());
        let pulses = capture.subscribe_pulses(None);
        let sweeps = capture.subscribe_sweeps();
        stop(shutdown, task).await;
        assert_eq!(pulses.recv().await, None);
        assert_eq!(sweeps.recv().await, None);
    }

    #[test]
    fn meta_packs_clocks_and_mode() {
        let snap = PulseSnapshot {
            trig_count: 7,
            trig_clock: 1_000_000,
            trig_prev_clock: 940_476,
            acp_count: 453,
            acp_clock: 999_000,
            arp_count: 2,
            arp_clock: 600_000,
            acp_at_arp: 450,
            num_samp: 4,
            dec_rate: 2,
            trig_delay: 30,
            options: Options::SUM,
            ..PulseSnapshot::default()
        };
        let meta = scanline_meta(&snap);
        assert_eq!(meta.trig_clock, 400_000);
        assert_eq!(meta.acp_clock >> 20, 3);
        assert_eq!(meta.acp_clock & 0xf_ffff, 1000);
        assert_eq!(meta.decim_rate_m1, 1);
        assert_eq!(meta.decim_mode(), DecimMode::Sum);
        assert_eq!(meta.trig_delay(), 30);
        // sum is only legal up to rate 4; above that the mode falls back
        let fast = PulseSnapshot {
            dec_rate: 8,
            ..snap
        };
        assert_eq!(scanline_meta(&fast).decim_mode(), DecimMode::PickNth);
    }

    #[test]
    fn prf_estimate_uses_prev_clock() {
        let snap = PulseSnapshot {
            trig_clock: 119_048,
            trig_prev_clock: 59_524,
            ..PulseSnapshot::default()
        };
        let prf = estimate_prf(&snap);
        assert!((prf - 2100.0).abs() < 1.0);
    }
}
