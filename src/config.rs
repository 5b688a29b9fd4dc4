//! Configuration loading.
//!
//! Reads digitizer and radar settings from a TOML file called
//! `ogdar.toml`, looked for in `/opt` (the top level of the SD card on the
//! stock Red Pitaya image) and then the current directory. A missing or
//! invalid file is not fatal: built-in defaults are applied and the
//! condition is surfaced to the operator and to clients through the
//! engine's telemetry.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Decimation rates at which the FPGA can average samples.
const AVERAGING_RATES: [u32; 8] = [1, 2, 4, 8, 64, 1024, 8192, 65_536];
/// Largest decimation rate at which the FPGA can sum samples.
const MAX_SUM_RATE: u32 = 4;

/// Where the active configuration came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConfigSource {
    /// Loaded and validated from an `ogdar.toml` file.
    File,
    /// Built-in defaults: bogus for most radars, but functional for at
    /// least one test radar (a Furuno FR-8252).
    Defaults,
}

/// Top-level configuration file contents. Unrecognized keys are ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Digitizer settings, written to the FPGA registers at startup.
    pub digdar: DigdarConfig,
    /// Radar description, used for display and telemetry.
    pub radar: RadarConfig,
}

/// The `[digdar]` section: pulse-detection thresholds, decimation and
/// capture geometry. Threshold values are signed in hardware scale:
/// 14-bit for the trigger channel, 12-bit for ACP and ARP.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DigdarConfig {
    /// ADC decimation rate (1..=65536).
    #[serde(rename = "DecimRate")]
    pub decim_rate: u32,
    /// Samples per capture (2..=16384, even).
    #[serde(rename = "NumSamp")]
    pub num_samp: u32,
    /// Option bitfield: bit 0 average, bit 1 sum, bit 2 negate video,
    /// bit 3 counting mode.
    #[serde(rename = "Options")]
    pub options: u32,
    /// Trigger source (0..=4).
    #[serde(rename = "TrigSource")]
    pub trig_source: u32,
    /// Trigger excitation threshold (-8192..=8191).
    #[serde(rename = "TrigThreshExcite")]
    pub trig_thresh_excite: i32,
    /// Trigger relaxation threshold (-8192..=8191).
    #[serde(rename = "TrigThreshRelax")]
    pub trig_thresh_relax: i32,
    /// Trigger debounce latency, in ADC clocks.
    #[serde(rename = "TrigLatency")]
    pub trig_latency: u32,
    /// Delay from trigger to first captured sample, in ADC clocks.
    #[serde(rename = "TrigDelay")]
    pub trig_delay: u32,
    /// ACP excitation threshold (-2048..=2047).
    #[serde(rename = "ACPThreshExcite")]
    pub acp_thresh_excite: i32,
    /// ACP relaxation threshold (-2048..=2047).
    #[serde(rename = "ACPThreshRelax")]
    pub acp_thresh_relax: i32,
    /// ACP debounce latency, in ADC clocks.
    #[serde(rename = "ACPLatency")]
    pub acp_latency: u32,
    /// ARP excitation threshold (-2048..=2047).
    #[serde(rename = "ARPThreshExcite")]
    pub arp_thresh_excite: i32,
    /// ARP relaxation threshold (-2048..=2047).
    #[serde(rename = "ARPThreshRelax")]
    pub arp_thresh_relax: i32,
    /// ARP debounce latency, in ADC clocks.
    #[serde(rename = "ARPLatency")]
    pub arp_latency: u32,
    /// Expected ACP pulses per ARP interval. Informational; the FPGA
    /// measures the live value itself.
    #[serde(rename = "ACPPerARP")]
    pub acp_per_arp: u32,
}

impl Default for DigdarConfig {
    fn default() -> DigdarConfig {
        DigdarConfig {
            decim_rate: 1,
            num_samp: 4000,
            options: 7,
            trig_source: 2,
            trig_thresh_excite: -6550,
            trig_thresh_relax: -8000,
            trig_latency: 12_500,
            trig_delay: 30,
            acp_thresh_excite: -1638,
            acp_thresh_relax: 1228,
            acp_latency: 500_000,
            arp_thresh_excite: -1638,
            arp_thresh_relax: 1228,
            arp_latency: 125_000_000,
            acp_per_arp: 450,
        }
    }
}

/// The `[radar]` section: a description of the radar being digitized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Radar make and model, used for display and output files.
    #[serde(rename = "Model")]
    pub model: String,
    /// Approximate pulse repetition frequency, Hz.
    #[serde(rename = "PRF")]
    pub prf: u32,
    /// ACP pulses per antenna rotation.
    #[serde(rename = "ACPsPerRotation")]
    pub acps_per_rotation: u32,
    /// Transmit power, in watts.
    #[serde(rename = "Power")]
    pub power: u32,
}

impl Default for RadarConfig {
    fn default() -> RadarConfig {
        RadarConfig {
            model: "WARNING: using default (bogus!) config because file ogdar.toml not found"
                .to_string(),
            prf: 2100,
            acps_per_rotation: 450,
            power: 25_000,
        }
    }
}

impl Config {
    /// Range and cross-field validation of the digitizer section.
    pub fn validate(&self) -> Result<()> {
        let d = &self.digdar;
        if !(1..=65_536).contains(&d.decim_rate) {
            anyhow::bail!("DecimRate {} out of range 1..=65536", d.decim_rate);
        }
        if !(2..=16_384).contains(&d.num_samp) || d.num_samp % 2 != 0 {
            anyhow::bail!("NumSamp {} must be even and in 2..=16384", d.num_samp);
        }
        if d.options > 0xf {
            anyhow::bail!("Options {:#x} has unknown bits set", d.options);
        }
        if d.trig_source > 4 {
            anyhow::bail!("TrigSource {} out of range 0..=4", d.trig_source);
        }
        for (name, value) in [
            ("TrigThreshExcite", d.trig_thresh_excite),
            ("TrigThreshRelax", d.trig_thresh_relax),
        ] {
            if !(-8192..=8191).contains(&value) {
                anyhow::bail!("{name} {value} out of 14-bit signed range");
            }
        }
        for (name, value) in [
            ("ACPThreshExcite", d.acp_thresh_excite),
            ("ACPThreshRelax", d.acp_thresh_relax),
            ("ARPThreshExcite", d.arp_thresh_excite),
            ("ARPThreshRelax", d.arp_thresh_relax),
        ] {
            if !(-2048..=2047).contains(&value) {
                anyhow::bail!("{name} {value} out of 12-bit signed range");
            }
        }
        if d.options & 0x2 != 0 && d.decim_rate > MAX_SUM_RATE {
            anyhow::bail!(
                "sum decimation is only available for rates <= {MAX_SUM_RATE} (rate is {})",
                d.decim_rate
            );
        }
        if d.options & 0x1 != 0 && !AVERAGING_RATES.contains(&d.decim_rate) {
            anyhow::bail!(
                "averaging is only available for rates {AVERAGING_RATES:?} (rate is {})",
                d.decim_rate
            );
        }
        Ok(())
    }

    /// The register writes that realize this configuration, in arming
    /// order: options first, then trigger selection, then capture
    /// geometry and thresholds. Signed thresholds are passed through
    /// bit-preserving.
    pub fn register_writes(&self) -> Vec<(&'static str, u32)> {
        let d = &self.digdar;
        vec![
            ("options", d.options),
            ("averaging", d.options & 0x1),
            ("trig_source", d.trig_source),
            ("dec_rate", d.decim_rate),
            ("num_samp", d.num_samp),
            ("trig_thresh_excite", d.trig_thresh_excite as u32),
            ("trig_thresh_relax", d.trig_thresh_relax as u32),
            ("trig_latency", d.trig_latency),
            ("trig_delay", d.trig_delay),
            ("acp_thresh_excite", d.acp_thresh_excite as u32),
            ("acp_thresh_relax", d.acp_thresh_relax as u32),
            ("acp_latency", d.acp_latency),
            ("arp_thresh_excite", d.arp_thresh_excite as u32),
            ("arp_thresh_relax", d.arp_thresh_relax as u32),
            ("arp_latency", d.arp_latency),
        ]
    }
}

/// Parses and validates configuration text.
pub fn parse(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).context("ogdar.toml is not valid TOML")?;
    config.validate()?;
    Ok(config)
}

/// Loads the configuration. `path_override` replaces the default search
/// locations (`/opt/ogdar.toml`, then `./ogdar.toml`). A missing file
/// yields the defaults; so does an invalid one, since half-applied
/// settings would be worse than the known-bogus baseline.
pub fn load(path_override: Option<&Path>) -> (Config, ConfigSource) {
    let defaults = [Path::new("/opt/ogdar.toml"), Path::new("ogdar.toml")];
    let override_paths;
    let candidates: &[&Path] = if let Some(path) = path_override {
        override_paths = [path];
        &override_paths
    } else {
        &defaults
    };
    for path in candidates {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => continue,
        };
        match parse(&text) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "configuration loaded");
                return (config, ConfigSource::File);
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "configuration rejected; keeping built-in defaults"
                );
                return (Config::default(), ConfigSource::Defaults);
            }
        }
    }
    tracing::warn!("no ogdar.toml found; using built-in defaults (bogus but functional for one test radar)");
    (Config::default(), ConfigSource::Defaults)
}
