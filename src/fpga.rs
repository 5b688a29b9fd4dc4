//! Digdar FPGA interface.
//!
//! This module contains the userspace driver for the digdar build of the
//! Red Pitaya oscilloscope FPGA. The register block and the four BRAM
//! capture buffers are mapped through `/dev/mem`; register layout comes
//! from the schema in [`crate::regs`], so the software accessors and the
//! generated FPGA sources always agree.
//!
//! The FPGA digitizes four radar channels: video (14-bit, fast ADC A),
//! trigger (14-bit, fast ADC B), and the ACP and ARP azimuth pulses
//! (12-bit, slow ADCs). Pulses detected on the trigger channel start
//! capture of the video channel into BRAM; ACP and ARP pulses are counted
//! to recover antenna azimuth.

use crate::buffer::SampleWriter;
use crate::mem::{DevMem, Mapping};
use crate::regs::Schema;
use anyhow::{Context, Result};
use std::sync::atomic::{fence, Ordering};

/// Fast ADC sampling rate (video and trigger channels), Hz.
pub const FAST_ADC_CLOCK_HZ: u32 = 125_000_000;
/// Slow ADC sampling rate (ACP and ARP channels), Hz.
pub const SLOW_ADC_CLOCK_HZ: u32 = 100_000;
/// Number of 32-bit words in each BRAM capture buffer.
pub const BRAM_WORDS: usize = 16 * 1024;
/// Size in bytes of each BRAM capture buffer.
pub const BRAM_BYTES: usize = 4 * BRAM_WORDS;
/// Physical address of the digdar register block.
pub const REGISTER_BASE: usize = 0x4010_0000;
/// Bits per video or trigger channel sample.
pub const FAST_ADC_BITS: u32 = 14;
/// Bits per ACP or ARP channel sample.
pub const SLOW_ADC_BITS: u32 = 12;

/// Largest decimation rate the FPGA supports.
pub const MAX_DECIM_RATE: u32 = 65_536;
/// Largest number of samples a capture can hold.
pub const MAX_NUM_SAMP: u32 = BRAM_WORDS as u32;

const VIDEO_OFFSET: usize = 0x1_0000;
const TRIGGER_OFFSET: usize = 0x2_0000;
const ACP_OFFSET: usize = 0x3_0000;
const ARP_OFFSET: usize = 0x4_0000;

const COMMAND_ARM: u32 = 1 << 0;
const COMMAND_RESET: u32 = 1 << 1;
const TRIG_SRC_MASK: u32 = 0xf;
const FAST_SAMPLE_MASK: u32 = (1 << FAST_ADC_BITS) - 1;

/// Source used to trigger a capture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TriggerSource {
    /// Never trigger.
    None,
    /// Trigger immediately upon arming.
    Immediate,
    /// Pulse detected on the radar trigger channel.
    RadarTrigger,
    /// Pulse detected on the ACP channel.
    Acp,
    /// Pulse detected on the ARP channel.
    Arp,
}

impl TriggerSource {
    /// Register encoding of the source.
    pub fn to_bits(self) -> u32 {
        match self {
            TriggerSource::None => 0,
            TriggerSource::Immediate => 1,
            TriggerSource::RadarTrigger => 2,
            TriggerSource::Acp => 3,
            TriggerSource::Arp => 4,
        }
    }

    /// Decodes a register value; fails on reserved encodings.
    pub fn from_bits(bits: u32) -> Option<TriggerSource> {
        Some(match bits {
            0 => TriggerSource::None,
            1 => TriggerSource::Immediate,
            2 => TriggerSource::RadarTrigger,
            3 => TriggerSource::Acp,
            4 => TriggerSource::Arp,
            _ => return None,
        })
    }
}

/// Digdar option flags, as stored in the `options` register.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Options(pub u32);

impl Options {
    /// Average consecutive samples at decimation.
    pub const AVERAGE: u32 = 1 << 0;
    /// Sum consecutive samples at decimation; only valid for rates <= 4.
    pub const SUM: u32 = 1 << 1;
    /// Negate video sample values.
    pub const NEGATE_VIDEO: u32 = 1 << 2;
    /// Record the ADC clock count instead of video samples.
    pub const COUNT_MODE: u32 = 1 << 3;

    /// True if the average flag is set.
    pub fn average(self) -> bool {
        self.0 & Self::AVERAGE != 0
    }

    /// True if the sum flag is set.
    pub fn sum(self) -> bool {
        self.0 & Self::SUM != 0
    }

    /// True if the negate-video flag is set.
    pub fn negate_video(self) -> bool {
        self.0 & Self::NEGATE_VIDEO != 0
    }

    /// True if the counting-mode flag is set.
    pub fn count_mode(self) -> bool {
        self.0 & Self::COUNT_MODE != 0
    }
}

/// One of the three pulse-detection channels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PulseChannel {
    /// Radar trigger pulses (fast ADC B).
    Trigger,
    /// Azimuth count pulses (slow ADC).
    Acp,
    /// Azimuth return pulses (slow ADC).
    Arp,
}

/// One of the four BRAM capture buffers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BramChannel {
    /// Video samples; the radar data.
    Video,
    /// Trigger channel samples, for threshold calibration.
    Trigger,
    /// ACP channel samples, for threshold calibration.
    Acp,
    /// ARP channel samples, for threshold calibration.
    Arp,
}

/// Metadata snapshot of the most recently captured pulse.
///
/// The `saved_*` registers are copied from the live counters by the FPGA
/// at the moment it commits to a capture, so the snapshot describes the
/// captured pulse even when the capture loop has fallen behind the radar.
/// The control fields (`num_samp`, `dec_rate`, `trig_delay`, `options`)
/// are the current register values; they only change between pulses.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PulseSnapshot {
    /// Trigger pulses since reset at capture, including uncaptured ones.
    pub trig_count: u32,
    /// ADC clock count at the captured pulse's trigger.
    pub trig_clock: u64,
    /// ADC clock count at the previous trigger pulse.
    pub trig_prev_clock: u64,
    /// ACP count at capture.
    pub acp_count: u32,
    /// ADC clock count at the last ACP before capture.
    pub acp_clock: u64,
    /// ARP count at capture.
    pub arp_count: u32,
    /// ADC clock count at the last ARP before capture.
    pub arp_clock: u64,
    /// ACPs between the two most recent ARPs at capture.
    pub acp_per_arp: u32,
    /// ACP count at the most recent ARP before capture.
    pub acp_at_arp: u32,
    /// Trigger count at the most recent ARP before capture.
    pub trig_at_arp: u32,
    /// Samples captured per pulse.
    pub num_samp: u32,
    /// Decimation rate in effect.
    pub dec_rate: u32,
    /// Trigger delay in effect, in ADC clocks.
    pub trig_delay: u32,
    /// Option flags in effect.
    pub options: u32,
}

/// The seam between the acquisition loop and the hardware. [`Fpga`] is the
/// production implementation; tests drive the loop with a synthetic one.
pub trait Digitizer: Send {
    /// Writes a register by schema name. Returns false if the name is
    /// unknown or the register is not writable.
    fn apply(&mut self, name: &str, value: u32) -> bool;
    /// Re-enables the capture state machine for the next pulse.
    fn arm(&mut self);
    /// Clears the write state machine.
    fn reset(&mut self);
    /// True once a capture has completed since the last arm.
    fn has_fired(&self) -> bool;
    /// Reads the saved metadata of the captured pulse.
    fn snapshot(&self) -> PulseSnapshot;
    /// Copies `n` video samples of the captured pulse into `dst`.
    fn read_video(&self, n: usize, dst: &SampleWriter<'_>);
}

macro_rules! register_offsets {
    (
        strobe: { $($st:ident),* $(,)? },
        r32: { $($r32:ident),* $(,)? },
        r64: { $($r64:ident),* $(,)? }
    ) => {
        paste::paste! {
            #[derive(Debug)]
            struct RegOffsets {
                $($st: usize,)*
                $($r32: usize,)*
                $($r64: usize,)*
            }

            impl RegOffsets {
                fn resolve(schema: &Schema) -> Result<RegOffsets> {
                    Ok(RegOffsets {
                        $(
                            $st: schema
                                .offset_of(stringify!($st))
                                .context(concat!("register `", stringify!($st), "` missing from schema"))?,
                        )*
                        $(
                            $r32: schema
                                .offset_of(stringify!($r32))
                                .context(concat!("register `", stringify!($r32), "` missing from schema"))?,
                        )*
                        $(
                            $r64: schema
                                .offset_of(stringify!($r64))
                                .context(concat!("register `", stringify!($r64), "` missing from schema"))?,
                        )*
                    })
                }
            }

            impl Fpga {
                $(
                    #[doc = concat!("Reads the `", stringify!($r32), "` register.")]
                    pub fn [<read_ $r32>](&self) -> u32 {
                        self.regs.read_u32(self.offsets.$r32)
                    }
                )*
                $(
                    #[doc = concat!("Reads the 64-bit `", stringify!($r64), "` register.")]
                    pub fn [<read_ $r64>](&self) -> u64 {
                        let lo = self.regs.read_u32(self.offsets.$r64) as u64;
                        let hi = self.regs.read_u32(self.offsets.$r64 + 4) as u64;
                        (hi << 32) | lo
                    }
                )*
            }
        }
    };
}

register_offsets! {
    strobe: { command },
    r32: {
        trig_source, num_samp, dec_rate, options, trig_delay,
        trig_thresh_excite, trig_thresh_relax, trig_latency,
        acp_thresh_excite, acp_thresh_relax, acp_latency,
        arp_thresh_excite, arp_thresh_relax, arp_latency,
        saved_trig_count, saved_acp_count, saved_arp_count,
        saved_acp_per_arp, saved_acp_at_arp, saved_trig_at_arp,
        acp_raw, arp_raw,
    },
    r64: { saved_trig_clock, saved_trig_prev_clock, saved_acp_clock, saved_arp_clock, clocks }
}

/// The digdar FPGA: mapped register block, mapped capture buffers, and
/// typed operations over them.
///
/// Reads from the capture buffers are side-effect free; reads and writes
/// of control registers have FPGA-visible effects. Mappings are released
/// in reverse mapping order when the value is dropped, and `/dev/mem` is
/// closed last.
#[derive(Debug)]
pub struct Fpga {
    offsets: RegOffsets,
    schema: &'static Schema,
    arp: Mapping,
    acp: Mapping,
    trigger: Mapping,
    video: Mapping,
    regs: Mapping,
    devmem: Option<DevMem>,
}

impl Fpga {
    /// Maps the register block and the four capture buffers through
    /// `/dev/mem`. Fatal on any failure: mappings made before the failure
    /// are unwound before returning.
    pub fn open() -> Result<Fpga> {
        let schema = Schema::digdar();
        let devmem = DevMem::open()?;
        let regs = devmem
            .map(REGISTER_BASE, schema.span())
            .context("failed to map digdar register block")?;
        let video = devmem
            .map(REGISTER_BASE + VIDEO_OFFSET, BRAM_BYTES)
            .context("failed to map video capture buffer")?;
        let trigger = devmem
            .map(REGISTER_BASE + TRIGGER_OFFSET, BRAM_BYTES)
            .context("failed to map trigger capture buffer")?;
        let acp = devmem
            .map(REGISTER_BASE + ACP_OFFSET, BRAM_BYTES)
            .context("failed to map ACP capture buffer")?;
        let arp = devmem
            .map(REGISTER_BASE + ARP_OFFSET, BRAM_BYTES)
            .context("failed to map ARP capture buffer")?;
        let offsets = RegOffsets::resolve(schema)?;
        tracing::info!(
            "mapped digdar FPGA at physical address {REGISTER_BASE:#08x} ({} registers)",
            schema.len()
        );
        Ok(Fpga {
            offsets,
            schema,
            arp,
            acp,
            trigger,
            video,
            regs,
            devmem: Some(devmem),
        })
    }

    /// Builds an `Fpga` over zeroed anonymous memory instead of the
    /// device. Register reads and writes behave like plain RAM; useful for
    /// bring-up and tests on machines without the digitizer.
    pub fn synthetic() -> Result<Fpga> {
        let schema = Schema::digdar();
        Ok(Fpga {
            offsets: RegOffsets::resolve(schema)?,
            schema,
            arp: Mapping::anonymous(BRAM_BYTES)?,
            acp: Mapping::anonymous(BRAM_BYTES)?,
            trigger: Mapping::anonymous(BRAM_BYTES)?,
            video: Mapping::anonymous(BRAM_BYTES)?,
            regs: Mapping::anonymous(schema.span())?,
            devmem: None,
        })
    }

    /// True if this instance is backed by RAM rather than the device.
    pub fn is_synthetic(&self) -> bool {
        self.devmem.is_none()
    }

    fn write_reg(&self, offset: usize, value: u32) {
        self.regs.write_u32(offset, value);
        fence(Ordering::Release);
    }

    /// Tells the FPGA to start digitizing at the next trigger detection.
    /// Must be called after every completed capture.
    pub fn arm(&self) {
        self.write_reg(self.offsets.command, COMMAND_ARM);
    }

    /// Resets the write state machine.
    pub fn reset(&self) {
        self.write_reg(self.offsets.command, COMMAND_RESET);
    }

    /// Chooses the source used to trigger data acquisition.
    pub fn select_trigger(&self, source: TriggerSource) {
        self.write_reg(self.offsets.trig_source, source.to_bits());
    }

    /// Sets the ADC decimation rate. Returns false if the rate is out of
    /// range. Whether the sum and average sub-modes are legal depends on
    /// the rate; that is enforced by the configuration loader, not here.
    pub fn set_decimation(&self, rate: u32) -> bool {
        if !(1..=MAX_DECIM_RATE).contains(&rate) {
            return false;
        }
        self.write_reg(self.offsets.dec_rate, rate);
        true
    }

    /// Sets the number of samples to capture after a trigger. The count
    /// must be even and between 2 and [`MAX_NUM_SAMP`].
    pub fn set_num_samples(&self, n: u32) -> bool {
        if !(2..=MAX_NUM_SAMP).contains(&n) || n % 2 != 0 {
            return false;
        }
        self.write_reg(self.offsets.num_samp, n);
        true
    }

    /// Sets the Schmitt-style excite/relax threshold pair for a pulse
    /// channel. Values are signed in hardware scale (14-bit for the
    /// trigger, 12-bit for ACP and ARP) passed as bit-preserving words.
    pub fn set_thresholds(&self, channel: PulseChannel, excite: u32, relax: u32) {
        let (e, r) = match channel {
            PulseChannel::Trigger => (self.offsets.trig_thresh_excite, self.offsets.trig_thresh_relax),
            PulseChannel::Acp => (self.offsets.acp_thresh_excite, self.offsets.acp_thresh_relax),
            PulseChannel::Arp => (self.offsets.arp_thresh_excite, self.offsets.arp_thresh_relax),
        };
        self.write_reg(e, excite);
        self.write_reg(r, relax);
    }

    /// Sets the minimum wait between relaxation and the next excitation
    /// for a pulse channel, in ADC clocks.
    pub fn set_latency(&self, channel: PulseChannel, clocks: u32) {
        let offset = match channel {
            PulseChannel::Trigger => self.offsets.trig_latency,
            PulseChannel::Acp => self.offsets.acp_latency,
            PulseChannel::Arp => self.offsets.arp_latency,
        };
        self.write_reg(offset, clocks);
    }

    /// Sets the wait between trigger detection and the start of video
    /// capture, in ADC clocks.
    pub fn set_trig_delay(&self, clocks: u32) {
        self.write_reg(self.offsets.trig_delay, clocks);
    }

    /// Sets the digdar option flags.
    pub fn set_options(&self, options: Options) {
        self.write_reg(self.offsets.options, options.0);
    }

    /// True once the FPGA has detected a trigger and completed sample
    /// acquisition since the last [`Fpga::arm`]. The FPGA signals this by
    /// zeroing the low nibble of the trigger-source register.
    pub fn has_fired(&self) -> bool {
        self.read_trig_source() & TRIG_SRC_MASK == 0
    }

    /// Reads a register by schema name; the low lane for 64-bit
    /// registers. Fails for unknown names and for strobe registers, which
    /// have no readable state.
    pub fn get_reg(&self, name: &str) -> Option<u32> {
        let index = self.schema.index_of(name)?;
        self.get_reg_by_index(index)
    }

    /// Reads a register by accessor-table index.
    pub fn get_reg_by_index(&self, index: usize) -> Option<u32> {
        let reg = self.schema.reg(index)?;
        reg.readable().then(|| self.regs.read_u32(reg.offset))
    }

    /// Writes a register by schema name. Fails for unknown names and
    /// registers the bus cannot write.
    pub fn set_reg(&self, name: &str, value: u32) -> bool {
        match self.schema.index_of(name) {
            Some(index) => self.set_reg_by_index(index, value),
            None => false,
        }
    }

    /// Writes a register by accessor-table index.
    pub fn set_reg_by_index(&self, index: usize, value: u32) -> bool {
        match self.schema.reg(index) {
            Some(reg) if reg.writable() => {
                self.write_reg(reg.offset, value);
                true
            }
            _ => false,
        }
    }

    /// Reads one raw 32-bit word from a capture buffer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the buffer.
    pub fn bram_word(&self, channel: BramChannel, index: usize) -> u32 {
        let bram = match channel {
            BramChannel::Video => &self.video,
            BramChannel::Trigger => &self.trigger,
            BramChannel::Acp => &self.acp,
            BramChannel::Arp => &self.arp,
        };
        bram.read_u32(4 * index)
    }
}

impl Digitizer for Fpga {
    fn apply(&mut self, name: &str, value: u32) -> bool {
        self.set_reg(name, value)
    }

    fn arm(&mut self) {
        Fpga::arm(self)
    }

    fn reset(&mut self) {
        Fpga::reset(self)
    }

    fn has_fired(&self) -> bool {
        Fpga::has_fired(self)
    }

    fn snapshot(&self) -> PulseSnapshot {
        fence(Ordering::Acquire);
        PulseSnapshot {
            trig_count: self.read_saved_trig_count(),
            trig_clock: self.read_saved_trig_clock(),
            trig_prev_clock: self.read_saved_trig_prev_clock(),
            acp_count: self.read_saved_acp_count(),
            acp_clock: self.read_saved_acp_clock(),
            arp_count: self.read_saved_arp_count(),
            arp_clock: self.read_saved_arp_clock(),
            acp_per_arp: self.read_saved_acp_per_arp(),
            acp_at_arp: self.read_saved_acp_at_arp(),
            trig_at_arp: self.read_saved_trig_at_arp(),
            num_samp: self.read_num_samp(),
            dec_rate: self.read_dec_rate(),
            trig_delay: self.read_trig_delay(),
            options: self.read_options(),
        }
    }

    fn read_video(&self, n: usize, dst: &SampleWriter<'_>) {
        let n = n.min(BRAM_WORDS).min(dst.len());
        for i in 0..n {
            let word = self.video.read_u32(4 * i);
            dst.write(i, (word & FAST_SAMPLE_MASK) as u16);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::ScanlineStore;
    use crate::regs::Mode;

    #[test]
    fn writable_registers_round_trip_by_name() {
        let fpga = Fpga::synthetic().unwrap();
        let writable: Vec<_> = fpga
            .schema
            .regs()
            .iter()
            .filter(|r| r.mode == Mode::ReadWrite)
            .map(|r| r.name.clone())
            .collect();
        assert!(writable.len() >= 15);
        for (i, name) in writable.iter().enumerate() {
            let value = 0x0101_0101u32.wrapping_mul(i as u32 + 1) ^ 0x5a5a;
            assert!(fpga.set_reg(name, value), "set {name}");
            assert_eq!(fpga.get_reg(name), Some(value), "get {name}");
        }
    }

    #[test]
    fn unknown_register_access_fails() {
        let fpga = Fpga::synthetic().unwrap();
        assert_eq!(fpga.get_reg("no_such_register"), None);
        assert!(!fpga.set_reg("no_such_register", 1));
        assert_eq!(fpga.get_reg_by_index(usize::MAX), None);
    }

    #[test]
    fn strobe_register_writes_but_does_not_read() {
        let fpga = Fpga::synthetic().unwrap();
        assert!(fpga.set_reg("command", COMMAND_ARM));
        assert_eq!(fpga.get_reg("command"), None);
    }

    #[test]
    fn read_only_register_rejects_writes() {
        let fpga = Fpga::synthetic().unwrap();
        assert!(!fpga.set_reg("saved_trig_count", 1));
        assert_eq!(fpga.get_reg("saved_trig_count"), Some(0));
    }

    #[test]
    fn decimation_range_is_enforced() {
        let fpga = Fpga::synthetic().unwrap();
        assert!(!fpga.set_decimation(0));
        assert!(!fpga.set_decimation(65_537));
        assert!(fpga.set_decimation(1));
        assert!(fpga.set_decimation(65_536));
        assert_eq!(fpga.read_dec_rate(), 65_536);
    }

    #[test]
    fn sample_count_must_be_even_and_in_range() {
        let fpga = Fpga::synthetic().unwrap();
        assert!(!fpga.set_num_samples(0));
        assert!(!fpga.set_num_samples(3));
        assert!(!fpga.set_num_samples(16_386));
        assert!(fpga.set_num_samples(4000));
        assert_eq!(fpga.read_num_samp(), 4000);
    }

    #[test]
    fn fired_is_a_zeroed_trigger_source() {
        let fpga = Fpga::synthetic().unwrap();
        fpga.select_trigger(TriggerSource::RadarTrigger);
        assert!(!fpga.has_fired());
        // the hardware clears the nibble when the capture completes
        fpga.set_reg("trig_source", 0);
        assert!(fpga.has_fired());
    }

    #[test]
    fn typed_setters_land_in_named_registers() {
        let fpga = Fpga::synthetic().unwrap();
        fpga.set_thresholds(PulseChannel::Trigger, (-6550i32) as u32, (-8000i32) as u32);
        fpga.set_latency(PulseChannel::Arp, 125_000_000);
        fpga.set_trig_delay(30);
        fpga.set_options(Options(Options::SUM | Options::NEGATE_VIDEO));
        assert_eq!(fpga.get_reg("trig_thresh_excite"), Some((-6550i32) as u32));
        assert_eq!(fpga.get_reg("trig_thresh_relax"), Some((-8000i32) as u32));
        assert_eq!(fpga.get_reg("arp_latency"), Some(125_000_000));
        assert_eq!(fpga.get_reg("trig_delay"), Some(30));
        let options = Options(fpga.read_options());
        assert!(options.sum() && options.negate_video());
        assert!(!options.average() && !options.count_mode());
    }

    #[test]
    fn sixty_four_bit_reads_combine_lanes() {
        let fpga = Fpga::synthetic().unwrap();
        let offset = fpga.schema.offset_of("clocks").unwrap();
        fpga.regs.write_u32(offset, 0x9abc_def0);
        fpga.regs.write_u32(offset + 4, 0x1234_5678);
        assert_eq!(fpga.read_clocks(), 0x1234_5678_9abc_def0);
        // the generic accessor sees the low lane
        assert_eq!(fpga.get_reg("clocks"), Some(0x9abc_def0));
    }

    #[test]
    fn video_copy_masks_to_sample_width() {
        let fpga = Fpga::synthetic().unwrap();
        for i in 0..4usize {
            fpga.video.write_u32(4 * i, 0xffff_c000 | (0x100 + i as u32));
        }
        let store = ScanlineStore::new(64, 4);
        let mut ring = crate::buffer::ScanlineRing::new(std::sync::Arc::clone(&store));
        let (_, span) = ring.alloc(4, 1).unwrap();
        let writer = store.writer(span);
        fpga.read_video(4, &writer);
        for i in 0..4usize {
            assert_eq!(store.arena().get(span.start + 2 + i), 0x100 + i as u16);
        }
    }

    #[test]
    fn snapshot_reads_saved_registers() {
        let fpga = Fpga::synthetic().unwrap();
        let schema = fpga.schema;
        let poke = |name: &str, v: u32| fpga.regs.write_u32(schema.offset_of(name).unwrap(), v);
        poke("saved_trig_count", 12345);
        poke("saved_arp_count", 10);
        poke("saved_acp_count", 452);
        poke("saved_acp_at_arp", 450);
        poke("num_samp", 4);
        poke("dec_rate", 1);
        let snap = Digitizer::snapshot(&fpga);
        assert_eq!(snap.trig_count, 12345);
        assert_eq!(snap.arp_count, 10);
        assert_eq!(snap.acp_count, 452);
        assert_eq!(snap.acp_at_arp, 450);
        assert_eq!(snap.num_samp, 4);
        assert_eq!(snap.dec_rate, 1);
    }
}
