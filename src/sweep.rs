//! Sweep ring and accumulator.
//!
//! Consecutive scanlines sharing an ARP count form one sweep: a full
//! rotation of the antenna. The accumulator groups scanlines into sweeps
//! as they are captured and closes the open sweep when the ARP count
//! changes. Closed and in-progress sweeps live in a small ring of sweep
//! records, addressed by compact handles validated against the ARP count.

use crate::buffer::{ScanlineHandle, ScanlineMeta};
use crate::fpga::FAST_ADC_CLOCK_HZ;
use chrono::{DateTime, Utc};
use std::ops::Range;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Bits of the ARP count carried in a sweep handle.
const ARP_BITS: u32 = 28;
const ARP_MASK: u32 = (1 << ARP_BITS) - 1;

/// Compact token identifying a buffered sweep: the sweep-ring index in
/// bits 31:28 and the low 28 bits of the sweep's ARP count below. At 60
/// RPM the ARP field wraps only after months of operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SweepHandle(u32);

impl SweepHandle {
    /// Builds a handle from a ring index and the sweep's ARP count.
    pub fn new(index: usize, arp: u32) -> SweepHandle {
        debug_assert!(index < (1 << 4));
        SweepHandle(((index as u32) << ARP_BITS) | (arp & ARP_MASK))
    }

    /// Ring index of the sweep.
    pub fn index(self) -> usize {
        (self.0 >> ARP_BITS) as usize
    }

    /// Low 28 bits of the sweep's ARP count.
    pub fn arp(self) -> u32 {
        self.0 & ARP_MASK
    }

    /// The packed token value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuilds a handle from its packed token value.
    pub fn from_raw(raw: u32) -> SweepHandle {
        SweepHandle(raw)
    }
}

/// A materialized sweep record.
///
/// `lines` and `lines2` are index ranges into the scanline ring. The
/// second range is non-empty only when the sweep wraps the end of the
/// ring. When a rotation produced more scanlines than the ring holds, the
/// ranges cover only the surviving tail.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// ARP count shared by every scanline in the sweep.
    pub arp: u32,
    /// Time the first scanline was captured.
    pub ts0: DateTime<Utc>,
    /// Time the most recent scanline was captured.
    pub ts1: DateTime<Utc>,
    /// Base rate of the sampling clock, in Hz.
    pub clock: u32,
    /// True if all scanlines share the same decimation and first-sample
    /// range.
    pub uniform: bool,
    /// Scanlines accumulated, including any that the scanline ring has
    /// since overwritten.
    pub n: u32,
    /// Handle to the first scanline (may be stale for long sweeps).
    pub first: ScanlineHandle,
    /// Handle to the last scanline.
    pub last: ScanlineHandle,
    /// First contiguous run of scanline-ring indices.
    pub lines: Range<usize>,
    /// Second run, used when the sweep wraps the ring boundary.
    pub lines2: Range<usize>,
}

#[derive(Debug, Default)]
struct SweepSlot {
    arp: AtomicU32,
    ts0: AtomicU64,
    ts1: AtomicU64,
    n: AtomicU32,
    uniform: AtomicU32,
    first_handle: AtomicU32,
    last_handle: AtomicU32,
    last_index: AtomicU32,
}

/// Shared read surface over the sweep ring.
#[derive(Debug)]
pub struct SweepStore {
    slots: Box<[SweepSlot]>,
    scanline_capacity: usize,
}

impl SweepStore {
    /// Creates a store of `capacity` sweep records whose scanline ranges
    /// are materialized against a scanline ring of `scanline_capacity`
    /// slots.
    pub fn new(capacity: usize, scanline_capacity: usize) -> Arc<SweepStore> {
        assert!(capacity <= 1 << 4, "sweep index field is 4 bits");
        let slots = (0..capacity).map(|_| SweepSlot::default()).collect();
        Arc::new(SweepStore {
            slots,
            scanline_capacity,
        })
    }

    /// Number of sweep records in the ring.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Checks a handle in O(1) against the slot's ARP count.
    pub fn is_valid(&self, handle: SweepHandle) -> bool {
        match self.slots.get(handle.index()) {
            Some(slot) => slot.arp.load(Ordering::Acquire) & ARP_MASK == handle.arp(),
            None => false,
        }
    }

    /// Materializes the sweep a handle refers to, or `None` if the slot
    /// has been reused for a later rotation.
    pub fn get(&self, handle: SweepHandle) -> Option<Sweep> {
        let slot = self.slots.get(handle.index())?;
        let arp = slot.arp.load(Ordering::Acquire);
        if arp & ARP_MASK != handle.arp() {
            return None;
        }
        let n = slot.n.load(Ordering::Relaxed);
        let last_index = slot.last_index.load(Ordering::Relaxed) as usize;
        let sweep = Sweep {
            arp,
            ts0: timestamp(slot.ts0.load(Ordering::Relaxed)),
            ts1: timestamp(slot.ts1.load(Ordering::Relaxed)),
            clock: FAST_ADC_CLOCK_HZ,
            uniform: slot.uniform.load(Ordering::Relaxed) != 0,
            n,
            first: ScanlineHandle::from_raw(slot.first_handle.load(Ordering::Relaxed)),
            last: ScanlineHandle::from_raw(slot.last_handle.load(Ordering::Relaxed)),
            lines: 0..0,
            lines2: 0..0,
        };
        let (lines, lines2) = self.line_ranges(n, last_index);
        // the slot may have been reopened for a new rotation mid-read
        fence(Ordering::Acquire);
        if slot.arp.load(Ordering::Relaxed) != arp {
            return None;
        }
        Some(Sweep {
            lines,
            lines2,
            ..sweep
        })
    }

    fn line_ranges(&self, n: u32, last_index: usize) -> (Range<usize>, Range<usize>) {
        let cap = self.scanline_capacity;
        let n_avail = (n as usize).min(cap);
        if n_avail == 0 || last_index >= cap {
            return (0..0, 0..0);
        }
        let start = (last_index + cap + 1 - n_avail) % cap;
        if start + n_avail <= cap {
            (start..start + n_avail, 0..0)
        } else {
            (start..cap, 0..start + n_avail - cap)
        }
    }
}

fn timestamp(micros: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros as i64).unwrap_or_default()
}

struct OpenSweep {
    arp: u32,
    slot: usize,
    n: u32,
    decim_rate_m1: u16,
    extra: u16,
}

/// Groups captured scanlines into sweeps. Owned by the acquisition loop;
/// the only writer to the sweep ring.
pub struct SweepAccumulator {
    store: Arc<SweepStore>,
    cursor: usize,
    open: Option<OpenSweep>,
    total: u64,
}

impl SweepAccumulator {
    /// Creates the producer side over a shared store.
    pub fn new(store: Arc<SweepStore>) -> SweepAccumulator {
        SweepAccumulator {
            store,
            cursor: 0,
            open: None,
            total: 0,
        }
    }

    /// The shared read surface.
    pub fn store(&self) -> &Arc<SweepStore> {
        &self.store
    }

    /// Folds one newly captured scanline into the open sweep. When the
    /// scanline's ARP count differs from the open sweep's, the open sweep
    /// is closed and its handle returned, and a new sweep is opened rooted
    /// at this scanline.
    pub fn on_scanline(
        &mut self,
        handle: ScanlineHandle,
        meta: &ScanlineMeta,
        ts_micros: u64,
    ) -> Option<SweepHandle> {
        match self.open.as_mut() {
            None => {
                self.open_sweep(handle, meta, ts_micros);
                None
            }
            Some(open) if meta.arp_count == open.arp => {
                let slot = &self.store.slots[open.slot];
                open.n += 1;
                slot.n.store(open.n, Ordering::Relaxed);
                slot.last_handle.store(handle.raw(), Ordering::Relaxed);
                slot.last_index.store(handle.index() as u32, Ordering::Relaxed);
                slot.ts1.store(ts_micros, Ordering::Relaxed);
                if (meta.decim_rate_m1, meta.extra) != (open.decim_rate_m1, open.extra) {
                    slot.uniform.store(0, Ordering::Relaxed);
                }
                None
            }
            Some(open) => {
                let closed = SweepHandle::new(open.slot, open.arp);
                self.cursor = (open.slot + 1) % self.store.slots.len();
                self.total += 1;
                self.open = None;
                self.open_sweep(handle, meta, ts_micros);
                Some(closed)
            }
        }
    }

    /// Handle of the sweep currently being built, if any.
    pub fn open_handle(&self) -> Option<SweepHandle> {
        self.open
            .as_ref()
            .map(|open| SweepHandle::new(open.slot, open.arp))
    }

    /// Number of sweeps closed since startup.
    pub fn total_sweeps(&self) -> u64 {
        self.total
    }

    fn open_sweep(&mut self, handle: ScanlineHandle, meta: &ScanlineMeta, ts_micros: u64) {
        let index = self.cursor;
        let slot = &self.store.slots[index];
        // storing the new ARP first retires any handles to the old record
        slot.arp.store(meta.arp_count, Ordering::Release);
        slot.ts0.store(ts_micros, Ordering::Relaxed);
        slot.ts1.store(ts_micros, Ordering::Relaxed);
        slot.n.store(1, Ordering::Relaxed);
        slot.uniform.store(1, Ordering::Relaxed);
        slot.first_handle.store(handle.raw(), Ordering::Relaxed);
        slot.last_handle.store(handle.raw(), Ordering::Relaxed);
        slot.last_index.store(handle.index() as u32, Ordering::Relaxed);
        self.open = Some(OpenSweep {
            arp: meta.arp_count,
            slot: index,
            n: 1,
            decim_rate_m1: meta.decim_rate_m1,
            extra: meta.extra,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCANLINE_CAP: usize = 1000;

    fn meta(arp_count: u32, trig_count: u32) -> ScanlineMeta {
        ScanlineMeta {
            arp_count,
            trig_clock: 0,
            trig_count,
            acp_clock: 0,
            decim_rate_m1: 0,
            extra: 0,
        }
    }

    fn feed(
        acc: &mut SweepAccumulator,
        arp: u32,
        pulses: Range<u32>,
        closed: &mut Vec<SweepHandle>,
    ) {
        for t in pulses {
            let handle = ScanlineHandle::new(t as usize % SCANLINE_CAP, t);
            if let Some(h) = acc.on_scanline(handle, &meta(arp, t), 1_700_000_000_000_000 + t as u64)
            {
                closed.push(h);
            }
        }
    }

    #[test]
    fn sweep_closes_on_arp_transition() {
        let store = SweepStore::new(5, SCANLINE_CAP);
        let mut acc = SweepAccumulator::new(Arc::clone(&store));
        let mut closed = Vec::new();
        feed(&mut acc, 10, 0..450, &mut closed);
        assert!(closed.is_empty());
        feed(&mut acc, 11, 450..451, &mut closed);
        assert_eq!(closed.len(), 1);
        let sweep = store.get(closed[0]).unwrap();
        assert_eq!(sweep.arp, 10);
        assert_eq!(sweep.n, 450);
        assert_eq!(sweep.lines, 0..450);
        assert_eq!(sweep.lines2, 0..0);
        assert!(sweep.uniform);
        assert_eq!(sweep.first, ScanlineHandle::new(0, 0));
        assert_eq!(sweep.last, ScanlineHandle::new(449, 449));
        assert!(sweep.ts1 > sweep.ts0);
        assert_eq!(acc.total_sweeps(), 1);
    }

    #[test]
    fn long_sweep_wraps_scanline_ring() {
        let store = SweepStore::new(5, SCANLINE_CAP);
        let mut acc = SweepAccumulator::new(Arc::clone(&store));
        let mut closed = Vec::new();
        feed(&mut acc, 10, 0..1200, &mut closed);
        feed(&mut acc, 11, 1200..1201, &mut closed);
        assert_eq!(closed.len(), 1);
        let sweep = store.get(closed[0]).unwrap();
        assert_eq!(sweep.n, 1200);
        // the ring only holds the last 1000 scanlines
        assert_eq!(sweep.lines, 200..1000);
        assert_eq!(sweep.lines2, 0..200);
    }

    #[test]
    fn uniform_clears_when_decimation_changes() {
        let store = SweepStore::new(5, SCANLINE_CAP);
        let mut acc = SweepAccumulator::new(Arc::clone(&store));
        acc.on_scanline(ScanlineHandle::new(0, 0), &meta(5, 0), 0);
        let mut changed = meta(5, 1);
        changed.decim_rate_m1 = 1;
        acc.on_scanline(ScanlineHandle::new(1, 1), &changed, 1);
        let closed = acc
            .on_scanline(ScanlineHandle::new(2, 2), &meta(6, 2), 2)
            .unwrap();
        assert!(!store.get(closed).unwrap().uniform);
    }

    #[test]
    fn open_sweep_is_observable_and_monotonic() {
        let store = SweepStore::new(5, SCANLINE_CAP);
        let mut acc = SweepAccumulator::new(Arc::clone(&store));
        let mut closed = Vec::new();
        feed(&mut acc, 42, 0..10, &mut closed);
        let open = acc.open_handle().unwrap();
        let before = store.get(open).unwrap();
        assert_eq!(before.n, 10);
        feed(&mut acc, 42, 10..20, &mut closed);
        let after = store.get(open).unwrap();
        assert_eq!(after.n, 20);
        assert!(after.ts1 >= before.ts1);
    }

    #[test]
    fn slot_reuse_invalidates_old_handles() {
        let store = SweepStore::new(2, SCANLINE_CAP);
        let mut acc = SweepAccumulator::new(Arc::clone(&store));
        let mut closed = Vec::new();
        for arp in 0..4 {
            feed(&mut acc, arp, arp * 10..arp * 10 + 10, &mut closed);
        }
        assert_eq!(closed.len(), 3);
        // sweep 0's slot has been reopened for sweep 2
        assert!(!store.is_valid(closed[0]));
        assert!(store.get(closed[0]).is_none());
        assert!(store.is_valid(closed[2]));
    }

    #[test]
    fn handle_packs_index_and_arp() {
        let h = SweepHandle::new(3, 0xfff_ffff + 5);
        assert_eq!(h.index(), 3);
        assert_eq!(h.arp(), 4);
        assert_eq!(SweepHandle::from_raw(h.raw()), h);
    }
}
