use std::path::Path;

use anyhow::{Result, anyhow};
use kboot_lib::utils::Utils;
use serde::{Deserialize, Serialize};

/// Default values of the application settings
pub struct Defaults;

impl Defaults {
    pub const VID: u16 = kboot_lib::DEFAULT_VID;
    pub const PID: u16 = kboot_lib::DEFAULT_PID;
    pub const DEBUG: u8 = 0;
    pub const BAUD: u32 = 57600;
}

/// Integer setting, either a JSON number or a literal such as `"0x15A2"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigInt {
    Number(u64),
    Literal(String),
}

impl ConfigInt {
    fn value(&self, name: &str) -> kboot_lib::Result<u64> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Literal(text) => Utils::parse_int(text).map_err(|e| {
                kboot_lib::Error::invalid_argument(format!("{} '{}': {}", name, text, e))
            }),
        }
    }

    pub fn to_u16(&self, name: &str) -> kboot_lib::Result<u16> {
        let value = self.value(name)?;
        u16::try_from(value).map_err(|_| {
            kboot_lib::Error::invalid_argument(format!("{} {} does not fit in 16 bits", name, value))
        })
    }

    pub fn to_u32(&self, name: &str) -> kboot_lib::Result<u32> {
        let value = self.value(name)?;
        u32::try_from(value).map_err(|_| {
            kboot_lib::Error::invalid_argument(format!("{} {} does not fit in 32 bits", name, value))
        })
    }
}

/// Root of the JSON configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KBootConfig {
    #[serde(default)]
    pub vid: Option<ConfigInt>,
    #[serde(default)]
    pub pid: Option<ConfigInt>,
    #[serde(default)]
    pub debug: Option<u8>,
    #[serde(default)]
    pub baud: Option<ConfigInt>,
}

impl KBootConfig {
    /// Load the configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read config file {}: {}", path.display(), e))?;
        Self::from_json(&content)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}
