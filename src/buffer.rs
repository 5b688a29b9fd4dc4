//! Sample and scanline ring buffers.
//!
//! Captured pulses flow from BRAM into a large sample ring and a parallel
//! ring of per-pulse scanline records. Both rings have exactly one writer
//! (the acquisition loop); clients read through compact handles whose
//! validity is checked in O(1). Storage recycling is detected with a
//! two-sample fingerprint written at the head of every scanline's sample
//! slice, so readers never block the writer and the writer never waits for
//! readers.

use std::sync::atomic::{fence, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

/// One digitized echo value: a 14-bit unsigned ADC sample in the low bits
/// of a 16-bit word.
pub type Sample = u16;

/// Reserved sample value used as a sentinel inside the sample ring. The
/// FPGA guarantees never to produce it.
pub const NOT_A_SAMPLE: Sample = 0x0000;

/// Number of buffered sweeps the rings are sized for.
pub const SWEEP_RING_CAPACITY: usize = 5;
/// Highest pulse repetition frequency the rings are sized for, in Hz.
pub const MAX_PRF: usize = 2200;
/// Slowest antenna rotation the rings are sized for, in RPM.
pub const MIN_RPM: usize = 22;
/// Most scanlines a single antenna rotation can contain.
pub const MAX_SWEEP_SCANLINES: usize = MAX_PRF * 60 / MIN_RPM;
/// Most samples a single scanline can contain.
pub const MAX_SCANLINE_SAMPLES: usize = 4000;
/// Default scanline ring capacity.
pub const SCANLINE_RING_CAPACITY: usize = SWEEP_RING_CAPACITY * MAX_SWEEP_SCANLINES;
/// Default sample ring capacity.
pub const SAMPLE_RING_CAPACITY: usize = SCANLINE_RING_CAPACITY * MAX_SCANLINE_SAMPLES;

/// Number of fingerprint samples prepended to every scanline's slice.
pub const FINGERPRINT_SAMPLES: usize = 2;

/// How the FPGA reduced the ADC stream to the recorded sample rate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DecimMode {
    /// Every n-th raw sample is recorded.
    PickNth,
    /// Consecutive raw samples are summed.
    Sum,
    /// Consecutive raw samples are averaged.
    Average,
}

impl DecimMode {
    /// Field encoding used in the scanline `extra` word (bits 15:14).
    pub fn to_bits(self) -> u16 {
        match self {
            DecimMode::PickNth => 0,
            DecimMode::Sum => 1,
            DecimMode::Average => 2,
        }
    }

    /// Decodes the `extra` field bits; unknown encodings read as pick-nth.
    pub fn from_bits(bits: u16) -> DecimMode {
        match bits & 0x3 {
            1 => DecimMode::Sum,
            2 => DecimMode::Average,
            _ => DecimMode::PickNth,
        }
    }
}

/// Packs the scanline `extra` word: decimation mode in bits 15:14 and the
/// additional trigger delay, in ADC clocks, in bits 13:0.
pub fn pack_extra(mode: DecimMode, trig_delay: u16) -> u16 {
    (mode.to_bits() << 14) | (trig_delay & 0x3fff)
}

/// Capture metadata of one scanline.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ScanlineMeta {
    /// Antenna return pulses since reset.
    pub arp_count: u32,
    /// ADC clock ticks between the last ARP and this pulse's trigger.
    pub trig_clock: u32,
    /// Trigger pulses since reset, including pulses that were not captured.
    pub trig_count: u32,
    /// Bits 31:20: ACPs since the last ARP; bits 19:0: ADC ticks since the
    /// last ACP.
    pub acp_clock: u32,
    /// ADC clocks per recorded sample, minus one.
    pub decim_rate_m1: u16,
    /// Bits 15:14: decimation mode; bits 13:0: additional trigger delay in
    /// ADC clocks.
    pub extra: u16,
}

impl ScanlineMeta {
    /// Low 16 bits of the trigger count; the scanline's serial number.
    pub fn serial(&self) -> u16 {
        self.trig_count as u16
    }

    /// Decimation mode recorded for this scanline.
    pub fn decim_mode(&self) -> DecimMode {
        DecimMode::from_bits(self.extra >> 14)
    }

    /// Additional trigger delay recorded for this scanline, in ADC clocks.
    pub fn trig_delay(&self) -> u16 {
        self.extra & 0x3fff
    }
}

/// A scanline's metadata together with its echo samples, copied out of the
/// ring with the fingerprint prefix stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanlineData {
    /// Capture metadata.
    pub meta: ScanlineMeta,
    /// Echo samples.
    pub samples: Vec<Sample>,
}

/// Compact token identifying a buffered scanline: the ring index in bits
/// 31:16 and the scanline serial (low 16 bits of `trig_count`) in bits
/// 15:0. At 2,100 pulses per second the serial wraps in about 31 seconds;
/// handles held longer than that can validate against an unrelated
/// scanline and should be refreshed by clients that care.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ScanlineHandle(u32);

impl ScanlineHandle {
    /// Builds a handle from a ring index and the scanline's trigger count.
    pub fn new(index: usize, trig_count: u32) -> ScanlineHandle {
        debug_assert!(index < (1 << 16));
        ScanlineHandle(((index as u32) << 16) | (trig_count & 0xffff))
    }

    /// Ring index of the scanline.
    pub fn index(self) -> usize {
        (self.0 >> 16) as usize
    }

    /// Scanline serial: the low 16 bits of its trigger count.
    pub fn serial(self) -> u16 {
        self.0 as u16
    }

    /// The packed token value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuilds a handle from its packed token value.
    pub fn from_raw(raw: u32) -> ScanlineHandle {
        ScanlineHandle(raw)
    }
}

/// A contiguous run of slots in the sample ring.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SampleSpan {
    /// First slot of the run.
    pub start: usize,
    /// Number of slots, including the fingerprint prefix.
    pub len: usize,
}

/// Fixed-size arena backing the sample ring. Slots are atomic so readers
/// may race the writer; torn or recycled reads are caught by the scanline
/// fingerprint, not prevented.
#[derive(Debug)]
pub struct SampleArena {
    cells: Box<[AtomicU16]>,
}

impl SampleArena {
    fn new(capacity: usize) -> SampleArena {
        let cells = (0..capacity).map(|_| AtomicU16::new(0)).collect();
        SampleArena { cells }
    }

    /// Number of sample slots in the arena.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Reads one slot.
    pub fn get(&self, index: usize) -> Sample {
        self.cells[index].load(Ordering::Relaxed)
    }

    fn set(&self, index: usize, value: Sample) {
        self.cells[index].store(value, Ordering::Relaxed);
    }
}

/// Write access to one span of the sample arena, handed to the digitizer
/// for the BRAM copy. Indexing is relative to the span and excludes the
/// fingerprint prefix.
#[derive(Debug)]
pub struct SampleWriter<'a> {
    arena: &'a SampleArena,
    span: SampleSpan,
}

impl SampleWriter<'_> {
    /// Number of echo samples the span can hold.
    pub fn len(&self) -> usize {
        self.span.len - FINGERPRINT_SAMPLES
    }

    /// True if the span holds no echo samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the `i`-th echo sample.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range for the span.
    pub fn write(&self, i: usize, value: Sample) {
        assert!(i < self.len());
        self.arena
            .set(self.span.start + FINGERPRINT_SAMPLES + i, value);
    }
}

/// Contiguous-slice allocator over the sample arena.
///
/// Allocation is monotonic with a single wrap rule: a request that does
/// not fit before the end of the arena wraps the cursor to zero first, so
/// one pulse's samples are never split across the boundary. No reader
/// state is tracked; recycling is detected by the scanline fingerprint.
#[derive(Debug)]
pub struct SampleRing {
    arena: Arc<SampleArena>,
    cursor: usize,
    total: u64,
}

impl SampleRing {
    fn new(arena: Arc<SampleArena>) -> SampleRing {
        SampleRing {
            arena,
            cursor: 0,
            total: 0,
        }
    }

    /// Reserves the next contiguous span of `n` slots, or `None` if `n` is
    /// zero or larger than the whole arena.
    pub fn alloc(&mut self, n: usize) -> Option<SampleSpan> {
        if n == 0 || n > self.arena.capacity() {
            return None;
        }
        if self.cursor + n > self.arena.capacity() {
            self.cursor = 0;
        }
        let span = SampleSpan {
            start: self.cursor,
            len: n,
        };
        self.cursor += n;
        // assumes the span will be filled
        self.total += n as u64;
        Some(span)
    }

    /// Total samples allocated since startup.
    pub fn total_samples(&self) -> u64 {
        self.total
    }
}

#[derive(Debug, Default)]
struct ScanlineSlot {
    arp_count: AtomicU32,
    trig_clock: AtomicU32,
    trig_count: AtomicU32,
    acp_clock: AtomicU32,
    decim_rate_m1: AtomicU32,
    extra: AtomicU32,
    samp_start: AtomicU32,
    samp_len: AtomicU32,
}

/// Shared read surface over the scanline ring and its sample arena.
///
/// The store is the half of the rings visible to clients: handle
/// validation and scanline reads. All mutation goes through the
/// producer-side [`ScanlineRing`].
#[derive(Debug)]
pub struct ScanlineStore {
    arena: Arc<SampleArena>,
    slots: Box<[ScanlineSlot]>,
}

impl ScanlineStore {
    /// Creates a store with the given ring capacities.
    pub fn new(sample_capacity: usize, scanline_capacity: usize) -> Arc<ScanlineStore> {
        let arena = Arc::new(SampleArena::new(sample_capacity));
        let slots = (0..scanline_capacity)
            .map(|_| ScanlineSlot::default())
            .collect();
        Arc::new(ScanlineStore { arena, slots })
    }

    /// Number of scanline slots in the ring.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The backing sample arena.
    pub fn arena(&self) -> &SampleArena {
        &self.arena
    }

    /// Write access to the echo-sample portion of a span.
    pub fn writer(&self, span: SampleSpan) -> SampleWriter<'_> {
        SampleWriter {
            arena: &self.arena,
            span,
        }
    }

    /// Checks a handle in O(1): the slot's trigger count and the sample
    /// fingerprint must both still match.
    pub fn is_valid(&self, handle: ScanlineHandle) -> bool {
        let Some(slot) = self.slots.get(handle.index()) else {
            return false;
        };
        if slot.trig_count.load(Ordering::Acquire) as u16 != handle.serial() {
            return false;
        }
        let start = slot.samp_start.load(Ordering::Relaxed) as usize;
        if start + FINGERPRINT_SAMPLES > self.arena.capacity() {
            return false;
        }
        self.arena.get(start) == NOT_A_SAMPLE && self.arena.get(start + 1) == handle.serial()
    }

    /// Reads the scanline a handle refers to, copying its samples out of
    /// the ring. Returns `None` if the handle is stale, or if the sample
    /// storage was recycled while the copy was in progress.
    pub fn get(&self, handle: ScanlineHandle) -> Option<ScanlineData> {
        let slot = self.slots.get(handle.index())?;
        let trig_count = slot.trig_count.load(Ordering::Acquire);
        if trig_count as u16 != handle.serial() {
            return None;
        }
        let meta = ScanlineMeta {
            arp_count: slot.arp_count.load(Ordering::Relaxed),
            trig_clock: slot.trig_clock.load(Ordering::Relaxed),
            trig_count,
            acp_clock: slot.acp_clock.load(Ordering::Relaxed),
            decim_rate_m1: slot.decim_rate_m1.load(Ordering::Relaxed) as u16,
            extra: slot.extra.load(Ordering::Relaxed) as u16,
        };
        let start = slot.samp_start.load(Ordering::Relaxed) as usize;
        let len = slot.samp_len.load(Ordering::Relaxed) as usize;
        if len < FINGERPRINT_SAMPLES || start + len > self.arena.capacity() {
            return None;
        }
        if self.arena.get(start) != NOT_A_SAMPLE || self.arena.get(start + 1) != handle.serial() {
            return None;
        }
        let samples: Vec<Sample> = (start + FINGERPRINT_SAMPLES..start + len)
            .map(|i| self.arena.get(i))
            .collect();
        // re-verify after the copy: a later pulse may have recycled the span
        fence(Ordering::Acquire);
        if slot.trig_count.load(Ordering::Relaxed) != trig_count
            || self.arena.get(start) != NOT_A_SAMPLE
            || self.arena.get(start + 1) != handle.serial()
        {
            return None;
        }
        Some(ScanlineData { meta, samples })
    }
}

/// Producer side of the scanline ring. Owned by the acquisition loop; the
/// only writer to the slots and the arena.
#[derive(Debug)]
pub struct ScanlineRing {
    store: Arc<ScanlineStore>,
    samples: SampleRing,
    cursor: usize,
    total: u64,
}

impl ScanlineRing {
    /// Creates the producer side over a shared store.
    pub fn new(store: Arc<ScanlineStore>) -> ScanlineRing {
        let samples = SampleRing::new(Arc::clone(&store.arena));
        ScanlineRing {
            store,
            samples,
            cursor: 0,
            total: 0,
        }
    }

    /// The shared read surface.
    pub fn store(&self) -> &Arc<ScanlineStore> {
        &self.store
    }

    /// Reserves a scanline slot and sample storage for `n_samples` echo
    /// samples, and writes the `{NOT_A_SAMPLE, serial}` fingerprint. The
    /// returned span includes the fingerprint prefix. Fails if the sample
    /// ring cannot supply the space.
    pub fn alloc(&mut self, n_samples: usize, trig_count: u32) -> Option<(usize, SampleSpan)> {
        let span = self.samples.alloc(n_samples + FINGERPRINT_SAMPLES)?;
        if self.cursor >= self.store.slots.len() {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        let arena = &self.store.arena;
        arena.set(span.start, NOT_A_SAMPLE);
        arena.set(span.start + 1, trig_count as u16);
        Some((index, span))
    }

    /// Publishes a scanline: all samples in `span` must already be
    /// written. Metadata becomes observable only after the samples, and
    /// the trigger count (the validation anchor) is stored last.
    pub fn publish(&mut self, index: usize, meta: ScanlineMeta, span: SampleSpan) {
        let slot = &self.store.slots[index];
        fence(Ordering::Release);
        slot.arp_count.store(meta.arp_count, Ordering::Relaxed);
        slot.trig_clock.store(meta.trig_clock, Ordering::Relaxed);
        slot.acp_clock.store(meta.acp_clock, Ordering::Relaxed);
        slot.decim_rate_m1
            .store(meta.decim_rate_m1 as u32, Ordering::Relaxed);
        slot.extra.store(meta.extra as u32, Ordering::Relaxed);
        slot.samp_start.store(span.start as u32, Ordering::Relaxed);
        slot.samp_len.store(span.len as u32, Ordering::Relaxed);
        slot.trig_count.store(meta.trig_count, Ordering::Release);
        self.total += 1;
    }

    /// Total scanlines published since startup.
    pub fn total_scanlines(&self) -> u64 {
        self.total
    }

    /// Total samples allocated since startup.
    pub fn total_samples(&self) -> u64 {
        self.samples.total_samples()
    }
}
