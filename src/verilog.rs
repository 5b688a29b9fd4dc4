//! Verilog snippet generation.
//!
//! Emits the hardware-side artifacts derived from the register schema:
//! memory-map offset definitions, register/wire declarations, and the
//! read, write and pulse dispatch clauses spliced into the FPGA project.
//! The snippet file names are stable across builds so the FPGA sources can
//! include them unchanged.

use crate::regs::{Mode, Reg, Schema, Width};
use std::fmt::Write;

/// Acknowledge signal asserted by the read dispatch.
const ACK: &str = "ack";
/// Read data bus driven by the read dispatch.
const RDATA: &str = "rdata";
/// Write data bus consumed by the write and pulse dispatch.
const WDATA: &str = "wdata";
/// Address bus compared by the pulse dispatch.
const ADDR: &str = "addr";

/// The stable file names of the emitted artifacts, paired with the emitter
/// that produces each one.
pub const ARTIFACTS: &[(&str, fn(&Schema) -> String)] = &[
    ("generated_mmap.v", memory_map),
    ("generated_regdefs.v", declarations),
    ("generated_getters.v", read_dispatch),
    ("generated_setters.v", write_dispatch),
    ("generated_pulsers.v", pulse_dispatch),
];

fn macro_name(reg: &Reg) -> String {
    reg.name.to_uppercase()
}

fn mmap_line(out: &mut String, name: &str, offset: usize, desc: &str) {
    let _ = writeln!(out, "`define OFFSET_{name:<30} 20'h{offset:06x} // {desc}");
}

/// Emits the memory-map offset definitions, one per 32-bit lane. A 64-bit
/// register expands into `_LO` at its offset and `_HI` four bytes above.
pub fn memory_map(schema: &Schema) -> String {
    let mut out = String::from("// memory map definitions - generated by gen_verilog\n\n");
    for reg in schema.regs() {
        let name = macro_name(reg);
        match reg.width {
            Width::W32 => mmap_line(&mut out, &name, reg.offset, reg.desc),
            Width::W64 => {
                mmap_line(
                    &mut out,
                    &format!("{name}_LO"),
                    reg.offset,
                    &format!("low 32-bits: {}", reg.desc),
                );
                mmap_line(&mut out, &format!("{name}_HI"), reg.offset + 4, "high 32-bits");
            }
        }
    }
    out
}

/// Emits one declaration per register, `reg` for storage and `wire` for
/// values driven by submodules.
pub fn declarations(schema: &Schema) -> String {
    let mut out = String::from("// register definitions - generated by gen_verilog\n\n");
    for reg in schema.regs() {
        let keyword = if reg.wire { "   wire" } else { "   reg " };
        let _ = writeln!(
            out,
            "{keyword} [{}-1: 0] {:<30}; // {}",
            reg.width.bits(),
            reg.hw_name,
            reg.desc
        );
    }
    out
}

fn getter_line(out: &mut String, name: &str, hw: &str, bits: &str) {
    let _ = writeln!(
        out,
        "        `OFFSET_{name:<30}  : begin {ACK} <= 1'b1;  {RDATA} <= {hw:<30}{bits}; end"
    );
}

/// Emits the read dispatch: one case clause per lane that raises the
/// acknowledge line and drives the data bus. Pulse-mode registers have no
/// readable state and are skipped.
pub fn read_dispatch(schema: &Schema) -> String {
    let mut out = String::from("// getter logic - generated by gen_verilog\n\n");
    for reg in schema.regs() {
        if !reg.readable() {
            continue;
        }
        let name = macro_name(reg);
        match reg.width {
            Width::W32 => getter_line(&mut out, &name, &reg.hw_name, "[32-1: 0]"),
            Width::W64 => {
                getter_line(&mut out, &format!("{name}_LO"), &reg.hw_name, "[32-1: 0]");
                getter_line(&mut out, &format!("{name}_HI"), &reg.hw_name, "[64-1:32]");
            }
        }
    }
    out
}

/// Emits the write dispatch: one case clause per lane assigning from the
/// write bus. Read-only and pulse-mode registers are skipped.
pub fn write_dispatch(schema: &Schema) -> String {
    let mut out = String::from("// setter logic - generated by gen_verilog\n\n");
    for reg in schema.regs() {
        if reg.mode != Mode::ReadWrite {
            continue;
        }
        let name = macro_name(reg);
        match reg.width {
            Width::W32 => {
                let _ = writeln!(
                    out,
                    "        `OFFSET_{name:<30}  : {:<30} <= {WDATA}[32-1: 0];",
                    reg.hw_name
                );
            }
            Width::W64 => {
                let _ = writeln!(
                    out,
                    "        `OFFSET_{:<30}  : {:<30}[32-1: 0] <= {WDATA}[32-1: 0];",
                    format!("{name}_LO"),
                    reg.hw_name
                );
                let _ = writeln!(
                    out,
                    "        `OFFSET_{:<30}  : {:<30}[64-1:32] <= {WDATA}[32-1: 0];",
                    format!("{name}_HI"),
                    reg.hw_name
                );
            }
        }
    }
    out
}

/// Emits the pulse dispatch: each pulse-mode register is driven from the
/// write bus on the cycle whose address matches it and zeroed on every
/// other cycle.
pub fn pulse_dispatch(schema: &Schema) -> String {
    let mut out = String::from("// pulser logic - generated by gen_verilog\n\n");
    for reg in schema.regs() {
        if reg.mode != Mode::Pulse {
            continue;
        }
        let name = macro_name(reg);
        match reg.width {
            Width::W32 => {
                let _ = writeln!(
                    out,
                    "        {} <= {{32{{{ADDR}[19:0] == `OFFSET_{name:<30}}}}} & {WDATA}[32-1: 0];",
                    reg.hw_name
                );
            }
            Width::W64 => {
                let _ = writeln!(
                    out,
                    "        {}[32-1: 0] <= {{32{{{ADDR}[19:0] == `OFFSET_{:<30}}}}} & {WDATA}[32-1: 0];",
                    reg.hw_name,
                    format!("{name}_LO")
                );
                let _ = writeln!(
                    out,
                    "        {}[64-1:32] <= {{32{{{ADDR}[19:0] == `OFFSET_{:<30}}}}} & {WDATA}[32-1: 0];",
                    reg.hw_name,
                    format!("{name}_HI")
                );
            }
        }
    }
    out
}
