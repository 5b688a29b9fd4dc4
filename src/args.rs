//! ogdar CLI arguments.
//!
//! This module contains the definition of the CLI arguments for the ogdar
//! capture server.

use clap::Parser;
use std::path::PathBuf;

/// ogdar CLI arguments.
#[derive(Parser, Debug, Clone, Eq, PartialEq, Hash)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file
    ///
    /// Overrides the default search for ogdar.toml in /opt and the
    /// current directory.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Milliseconds to wait for the FPGA to report a capture before
    /// declaring it silent and re-arming
    #[clap(long, default_value_t = 2000)]
    pub fire_timeout_ms: u64,
    /// Microseconds to sleep between polls of the FPGA fired status
    #[clap(long, default_value_t = 50)]
    pub poll_interval_us: u64,
    /// Run against a RAM-backed register block instead of /dev/mem
    ///
    /// Useful for bring-up on machines without the digitizer; no pulses
    /// will ever fire.
    #[clap(long)]
    pub synthetic: bool,
}
