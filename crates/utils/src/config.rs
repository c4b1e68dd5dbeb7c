use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{address, Address, Bytes};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

/// Default capacity of a contract's eval cache.
pub const DEFAULT_EVAL_CACHE_CAPACITY: usize = 0x1000;

/// Default gas limit of every transaction submitted to the engine.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

/// ERC-5202 blueprint preamble: `0xFE` marker, version 0, no data section.
pub const DEFAULT_BLUEPRINT_PREAMBLE: [u8; 3] = [0xfe, 0x71, 0x00];

/// Default transaction sender, also the seed of generated addresses.
pub const DEFAULT_SENDER: Address = address!("00000000000000000000000000000000005911ce");

pub struct ConfigPath {
    root: Option<PathBuf>,
}

impl ConfigPath {
    /// New config path.
    pub fn new(root: Option<impl Into<PathBuf>>) -> Self {
        Self { root: root.map(Into::into) }
    }

    /// Returns the path to splice's home dir: `~/.splice` by default.
    pub fn splice_dir(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| dirs_next::home_dir().map(|p| p.join(".splice")))
    }

    /// Returns the path to the config file: `<root>/config.toml`.
    pub fn config_file(&self) -> Option<PathBuf> {
        Some(self.splice_dir()?.join("config.toml"))
    }
}

/// Settings shared by the execution environment and every contract deployed in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Maximum number of compiled fragments memoized per contract.
    pub eval_cache_capacity: usize,
    /// Gas limit of each computation.
    pub gas_limit: u64,
    pub chain_id: u64,
    /// Caller of every computation.
    pub sender: Address,
    /// Bytes placed between the blueprint trampoline and the runtime code.
    pub blueprint_preamble: Bytes,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            eval_cache_capacity: DEFAULT_EVAL_CACHE_CAPACITY,
            gas_limit: DEFAULT_GAS_LIMIT,
            chain_id: 1,
            sender: DEFAULT_SENDER,
            blueprint_preamble: Bytes::from_static(&DEFAULT_BLUEPRINT_PREAMBLE),
        }
    }
}

impl HarnessConfig {
    /// Loads the config from a TOML file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        trace!("loading config: {:?}", path);

        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads the config from `path` if given, otherwise from the default config file if it
    /// exists, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match ConfigPath::new(None::<PathBuf>).config_file() {
            Some(file) if file.exists() => Self::load(file),
            _ => {
                trace!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
