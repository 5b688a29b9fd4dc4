//! FPGA register schema.
//!
//! This module is the single source of truth for the layout of the digdar
//! register block. The same declarative table drives the Verilog snippets
//! included in the FPGA build (see [`crate::verilog`]) and the software
//! accessor table used by the control facade (see [`crate::fpga`]), so the
//! two cannot drift apart.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Access mode of a register, as seen from the processor bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Read-only. No write dispatch is generated.
    Read,
    /// Read-write storage.
    ReadWrite,
    /// One-shot strobe. The register holds the written value for a single
    /// clock cycle and reads back as zero, so no read dispatch is generated.
    Pulse,
}

/// Bit width of a register. 64-bit registers occupy two consecutive bus
/// lanes, exposed as `_LO` and `_HI` in the memory map.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Width {
    /// One 32-bit lane.
    W32,
    /// Two 32-bit lanes.
    W64,
}

impl Width {
    /// Size in bytes of the register.
    pub fn bytes(self) -> usize {
        match self {
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    /// Size in bits of the register.
    pub fn bits(self) -> usize {
        8 * self.bytes()
    }
}

/// One register in the declarative schema table.
#[derive(Debug, Copy, Clone)]
pub struct RegDecl {
    /// Name visible to external code and in the memory map.
    pub name: &'static str,
    /// Name of the backing register or wire in the FPGA logic.
    pub hw_name: &'static str,
    /// Bit width.
    pub width: Width,
    /// Access mode.
    pub mode: Mode,
    /// True if the value comes from a submodule wire rather than storage
    /// declared in the top-level module.
    pub wire: bool,
    /// Human-readable description, copied into the generated artifacts.
    pub desc: &'static str,
}

/// One entry in the schema: either a flat run of registers or a group that
/// re-emits a register list under a name prefix. Groups are how the
/// `saved_` snapshot copies of the live metadata are produced without
/// duplicating their declarations.
#[derive(Debug, Copy, Clone)]
pub enum SchemaEntry {
    /// Registers emitted as declared.
    Regs(&'static [RegDecl]),
    /// Registers emitted with `prefix` prepended to name and hardware name.
    /// Grouped copies are always storage (never wires): they hold snapshots
    /// of values originally sourced from wires.
    Group {
        /// Name prefix, e.g. `"saved_"`.
        prefix: &'static str,
        /// The register list to re-emit.
        regs: &'static [RegDecl],
    },
}

/// A register with its assigned byte offset, produced by flattening the
/// schema entries in declaration order.
#[derive(Debug, Clone)]
pub struct Reg {
    /// Externally visible name (group prefix applied).
    pub name: String,
    /// FPGA-side register or wire name (group prefix applied).
    pub hw_name: String,
    /// Bit width.
    pub width: Width,
    /// Access mode.
    pub mode: Mode,
    /// True if backed by a wire.
    pub wire: bool,
    /// Human-readable description.
    pub desc: &'static str,
    /// Byte offset of the low-order lane within the register block.
    pub offset: usize,
}

impl Reg {
    /// True if the register accepts writes from the bus.
    pub fn writable(&self) -> bool {
        matches!(self.mode, Mode::ReadWrite | Mode::Pulse)
    }

    /// True if the register can be read back over the bus.
    pub fn readable(&self) -> bool {
        !matches!(self.mode, Mode::Pulse)
    }
}

/// The flattened register schema with assigned offsets and a name index.
#[derive(Debug)]
pub struct Schema {
    regs: Vec<Reg>,
    index: HashMap<String, usize>,
    span: usize,
}

const fn decl(
    name: &'static str,
    hw_name: &'static str,
    width: Width,
    mode: Mode,
    wire: bool,
    desc: &'static str,
) -> RegDecl {
    RegDecl {
        name,
        hw_name,
        width,
        mode,
        wire,
        desc,
    }
}

/// Oscilloscope-side control registers. `command` is a strobe: the arm and
/// reset bits are held for one cycle and then cleared by the FPGA.
const CONTROL: &[RegDecl] = &[
    decl(
        "command",
        "command",
        Width::W32,
        Mode::Pulse,
        false,
        "bit 0: arm trigger; bit 1: reset write state machine",
    ),
    decl(
        "trig_source",
        "trig_source",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 3:0: trigger source; zeroed by FPGA when capture completes",
    ),
    decl(
        "num_samp",
        "num_samp",
        Width::W32,
        Mode::ReadWrite,
        false,
        "number of decimated samples to capture after trigger",
    ),
    decl(
        "dec_rate",
        "dec_rate",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 16:0: ADC decimation rate",
    ),
    decl(
        "averaging",
        "averaging",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bit 0: enable sample averaging at decimation",
    ),
    decl(
        "options",
        "options",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bit 0: average; bit 1: sum; bit 2: negate video; bit 3: counting mode",
    ),
    decl(
        "adc_counter",
        "adc_counter",
        Width::W32,
        Mode::Read,
        true,
        "14-bit ADC counter used in counting mode",
    ),
];

/// Schmitt-style pulse-detection registers for the trigger, ACP and ARP
/// channels, plus the traditional radar trigger delay.
const PULSE_DETECT: &[RegDecl] = &[
    decl(
        "trig_thresh_excite",
        "trig_thresh_excite",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 13:0: signed trigger excitation threshold",
    ),
    decl(
        "trig_thresh_relax",
        "trig_thresh_relax",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 13:0: signed trigger relaxation threshold",
    ),
    decl(
        "trig_delay",
        "trig_delay",
        Width::W32,
        Mode::ReadWrite,
        false,
        "ADC clocks to wait after trigger before capturing video",
    ),
    decl(
        "trig_latency",
        "trig_latency",
        Width::W32,
        Mode::ReadWrite,
        false,
        "minimum ADC clocks between trigger relaxation and next excitation",
    ),
    decl(
        "acp_thresh_excite",
        "acp_thresh_excite",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 11:0: signed ACP excitation threshold",
    ),
    decl(
        "acp_thresh_relax",
        "acp_thresh_relax",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 11:0: signed ACP relaxation threshold",
    ),
    decl(
        "acp_latency",
        "acp_latency",
        Width::W32,
        Mode::ReadWrite,
        false,
        "minimum ADC clocks between ACP relaxation and next excitation",
    ),
    decl(
        "arp_thresh_excite",
        "arp_thresh_excite",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 11:0: signed ARP excitation threshold",
    ),
    decl(
        "arp_thresh_relax",
        "arp_thresh_relax",
        Width::W32,
        Mode::ReadWrite,
        false,
        "bits 11:0: signed ARP relaxation threshold",
    ),
    decl(
        "arp_latency",
        "arp_latency",
        Width::W32,
        Mode::ReadWrite,
        false,
        "minimum ADC clocks between ARP relaxation and next excitation",
    ),
];

/// Live capture metadata. These are wires driven by the trigger, ACP and
/// ARP counting submodules. The same list is emitted a second time under
/// the `saved_` prefix: the FPGA copies the live values into the saved
/// registers at the moment it commits to capturing a pulse, so a capture
/// loop that falls behind still reads per-pulse-correct metadata.
const METADATA: &[RegDecl] = &[
    decl(
        "trig_count",
        "trig_count",
        Width::W32,
        Mode::Read,
        true,
        "trigger pulses detected since reset",
    ),
    decl(
        "trig_clock",
        "trig_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at last trigger pulse",
    ),
    decl(
        "trig_prev_clock",
        "trig_prev_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at previous trigger pulse",
    ),
    decl(
        "acp_count",
        "acp_count",
        Width::W32,
        Mode::Read,
        true,
        "ACP pulses detected since reset",
    ),
    decl(
        "acp_clock",
        "acp_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at last ACP pulse",
    ),
    decl(
        "acp_prev_clock",
        "acp_prev_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at previous ACP pulse",
    ),
    decl(
        "arp_count",
        "arp_count",
        Width::W32,
        Mode::Read,
        true,
        "ARP pulses detected since reset",
    ),
    decl(
        "arp_clock",
        "arp_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at last ARP pulse",
    ),
    decl(
        "arp_prev_clock",
        "arp_prev_clock",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock count at previous ARP pulse",
    ),
    decl(
        "acp_per_arp",
        "acp_per_arp",
        Width::W32,
        Mode::Read,
        true,
        "ACP pulses between the two most recent ARP pulses",
    ),
    decl(
        "acp_at_arp",
        "acp_at_arp",
        Width::W32,
        Mode::Read,
        true,
        "ACP count at the most recent ARP pulse",
    ),
    decl(
        "trig_at_arp",
        "trig_at_arp",
        Width::W32,
        Mode::Read,
        true,
        "trigger count at the most recent ARP pulse",
    ),
];

/// Counters and raw channel values after the snapshot block.
const TAIL: &[RegDecl] = &[
    decl(
        "clocks",
        "clocks",
        Width::W64,
        Mode::Read,
        true,
        "ADC clock ticks since reset",
    ),
    decl(
        "acp_raw",
        "acp_raw",
        Width::W32,
        Mode::Read,
        true,
        "most recent slow ADC value from the ACP channel",
    ),
    decl(
        "arp_raw",
        "arp_raw",
        Width::W32,
        Mode::Read,
        true,
        "most recent slow ADC value from the ARP channel",
    ),
];

/// The digdar register block, in bus-offset order.
pub const DIGDAR_SCHEMA: &[SchemaEntry] = &[
    SchemaEntry::Regs(CONTROL),
    SchemaEntry::Regs(PULSE_DETECT),
    SchemaEntry::Regs(METADATA),
    SchemaEntry::Group {
        prefix: "saved_",
        regs: METADATA,
    },
    SchemaEntry::Regs(TAIL),
];

impl Schema {
    /// Flattens a list of schema entries, assigning byte offsets in
    /// declaration order: 4 bytes per 32-bit register, 8 bytes per 64-bit
    /// register. Grouped registers get the group prefix on both names and
    /// are forced to storage, since they hold copies of wire values.
    pub fn build(entries: &[SchemaEntry]) -> Schema {
        let mut regs = Vec::new();
        let mut offset = 0usize;
        let mut push = |decls: &[RegDecl], prefix: &str| {
            for d in decls {
                regs.push(Reg {
                    name: format!("{prefix}{}", d.name),
                    hw_name: format!("{prefix}{}", d.hw_name),
                    width: d.width,
                    mode: d.mode,
                    wire: d.wire && prefix.is_empty(),
                    desc: d.desc,
                    offset,
                });
                offset += d.width.bytes();
            }
        };
        for entry in entries {
            match entry {
                SchemaEntry::Regs(decls) => push(decls, ""),
                SchemaEntry::Group { prefix, regs } => push(regs, prefix),
            }
        }
        let index = regs
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Schema {
            regs,
            index,
            span: offset,
        }
    }

    /// The digdar schema, built once per process.
    pub fn digdar() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::build(DIGDAR_SCHEMA))
    }

    /// All registers in offset order.
    pub fn regs(&self) -> &[Reg] {
        &self.regs
    }

    /// Number of registers (not lanes).
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// True if the schema contains no registers.
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Total byte span of the register block.
    pub fn span(&self) -> usize {
        self.span
    }

    /// Looks up a register by name.
    pub fn lookup(&self, name: &str) -> Option<&Reg> {
        self.index.get(name).map(|&i| &self.regs[i])
    }

    /// Index of a register in the accessor table.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Register at a given accessor-table index.
    pub fn reg(&self, index: usize) -> Option<&Reg> {
        self.regs.get(index)
    }

    /// Byte offset of a register's low lane.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.lookup(name).map(|r| r.offset)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets_are_sequential() {
        let schema = Schema::digdar();
        let mut expected = 0;
        for reg in schema.regs() {
            assert_eq!(reg.offset, expected, "offset of {}", reg.name);
            expected += reg.width.bytes();
        }
        assert_eq!(schema.span(), expected);
    }

    #[test]
    fn control_block_layout() {
        let schema = Schema::digdar();
        assert_eq!(schema.offset_of("command"), Some(0x00));
        assert_eq!(schema.offset_of("trig_source"), Some(0x04));
        assert_eq!(schema.offset_of("num_samp"), Some(0x08));
        assert_eq!(schema.offset_of("dec_rate"), Some(0x0c));
        assert_eq!(schema.offset_of("averaging"), Some(0x10));
        assert_eq!(schema.offset_of("options"), Some(0x14));
        assert_eq!(schema.offset_of("adc_counter"), Some(0x18));
    }

    #[test]
    fn saved_group_mirrors_live_metadata() {
        let schema = Schema::digdar();
        for d in METADATA {
            let live = schema.lookup(d.name).unwrap();
            let saved = schema.lookup(&format!("saved_{}", d.name)).unwrap();
            assert_eq!(live.width, saved.width);
            assert_eq!(live.mode, saved.mode);
            assert!(live.wire, "{} should be a wire", live.name);
            assert!(!saved.wire, "{} should be storage", saved.name);
            assert_eq!(saved.hw_name, format!("saved_{}", d.hw_name));
        }
    }

    #[test]
    fn sixty_four_bit_registers_take_two_lanes() {
        let schema = Schema::digdar();
        let clock = schema.lookup("trig_clock").unwrap();
        let next = schema.lookup("trig_prev_clock").unwrap();
        assert_eq!(clock.width, Width::W64);
        assert_eq!(next.offset, clock.offset + 8);
    }

    #[test]
    fn name_index_round_trips() {
        let schema = Schema::digdar();
        for (i, reg) in schema.regs().iter().enumerate() {
            assert_eq!(schema.index_of(&reg.name), Some(i));
            assert_eq!(schema.reg(i).unwrap().offset, reg.offset);
        }
        assert!(schema.lookup("no_such_register").is_none());
    }

    #[test]
    fn block_fits_below_bram_windows() {
        // The capture buffers start at offset 0x10000 from the register
        // base; the register block must stay clear of them.
        assert!(Schema::digdar().span() <= 0x10000);
    }
}
