use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use kboot_lib::utils::Utils;

use crate::config::{Defaults, KBootConfig};

/// Connection settings after merging the command line, the config file and
/// the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub vid: u16,
    pub pid: u16,
    pub debug: u8,
    pub baud: u32,
}

#[derive(Parser, Debug)]
#[command(
    name = "kboot",
    author,
    version,
    about = "Kinetis bootloader serial utility",
    long_about = None,
    disable_help_flag = true
)]
pub struct Cli {
    /// Print help
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    pub help: Option<bool>,

    /// USB Vendor ID (default: 0x15A2)
    #[arg(long = "vid")]
    pub vid: Option<String>,

    /// USB Product ID (default: 0x0073)
    #[arg(long = "pid")]
    pub pid: Option<String>,

    /// Set debug level (0-off, 1-info, 2-debug)
    #[arg(long = "debug", value_parser = clap::value_parser!(u8).range(0..=2))]
    pub debug: Option<u8>,

    /// JSON configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Get MCU info (kboot properties)
    #[command(name = "info")]
    Info,

    /// Write data into MCU memory
    #[command(name = "write")]
    Write(Write),

    /// Read data from MCU memory
    #[command(name = "read")]
    Read(Read),

    /// Erase MCU memory
    #[command(name = "erase")]
    Erase(Erase),

    /// Unlock MCU
    #[command(name = "unlock")]
    Unlock(Unlock),

    /// Fill MCU memory with specified pattern
    #[command(name = "fill")]
    Fill(Fill),

    /// Reset MCU
    #[command(name = "reset")]
    Reset,
}

#[derive(Parser, Debug, Clone)]
pub struct Write {
    /// Start Address (default: 0x00000000)
    #[arg(short = 'a', long = "addr", default_value = "0x00000000")]
    pub addr: String,

    /// Offset of input data (default: 0x00000000)
    #[arg(short = 'o', long = "offset", default_value = "0x00000000")]
    pub offset: String,

    /// Input file name with extension: *.bin, *.hex, *.s19, *.srec or *.s
    #[arg(short = 'f', long = "file", required = true)]
    pub file: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct Read {
    /// Start Address (default: 0x00000000)
    #[arg(short = 'a', long = "addr", default_value = "0x00000000")]
    pub addr: String,

    /// Count of bytes
    #[arg(short = 'l', long = "length", required = true)]
    pub length: String,

    /// Output file name with extension: *.bin, *.hex, *.s19, *.srec or *.s
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct Erase {
    /// Start Address (default: 0x00000000)
    #[arg(short = 'a', long = "addr", default_value = "0x00000000")]
    pub addr: String,

    /// Count of bytes (must be aligned by 4)
    #[arg(short = 'l', long = "length")]
    pub length: Option<String>,

    /// Erase complete MCU memory
    #[arg(short = 'm', long = "mass", action = ArgAction::Set, default_value_t = false)]
    pub mass: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Unlock {
    /// Use backdoor key as str = S:0123...F or hex = X:010203...0F
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct Fill {
    /// Start Address (default: 0x00000000)
    #[arg(short = 'a', long = "addr", default_value = "0x00000000")]
    pub addr: String,

    /// Count of bytes
    #[arg(short = 'l', long = "length", required = true)]
    pub length: String,

    /// Pattern format
    #[arg(short = 'p', long = "pattern", default_value = kboot_lib::fill_memory::DEFAULT_PATTERN)]
    pub pattern: String,
}

/// Merge CLI arguments with the configuration file, CLI args take precedence
pub fn merge_config(args: &Cli, config: Option<KBootConfig>) -> Result<MergedConfig> {
    let base_config = config.unwrap_or_default();

    let vid = match &args.vid {
        Some(vid) => Utils::parse_u16("vid", vid)?,
        None => match &base_config.vid {
            Some(vid) => vid.to_u16("vid")?,
            None => Defaults::VID,
        },
    };
    let pid = match &args.pid {
        Some(pid) => Utils::parse_u16("pid", pid)?,
        None => match &base_config.pid {
            Some(pid) => pid.to_u16("pid")?,
            None => Defaults::PID,
        },
    };
    let baud = match &base_config.baud {
        Some(baud) => baud.to_u32("baud")?,
        None => Defaults::BAUD,
    };
    if baud == 0 {
        bail!("baud rate must not be zero");
    }

    let debug = args
        .debug
        .or(base_config.debug)
        .unwrap_or(Defaults::DEBUG);
    if debug > 2 {
        bail!("debug level {} is out of range (0-2)", debug);
    }

    Ok(MergedConfig {
        vid,
        pid,
        debug,
        baud,
    })
}
