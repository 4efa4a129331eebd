//! Typed configuration structs for the keys enumerated in spec §6.
//!
//! Locating the config file, watching it, and wiring CLI overrides are out
//! of scope (spec §1); this module owns the *shape* of the configuration
//! components are constructed from, plus a minimal INI-format reader since
//! nothing upstream of this crate is guaranteed to hand us already-typed
//! values.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::str::FromStr;

/// `[network]` section: listener addresses and ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub url: String,
    pub port_tcp_up: u16,
    pub port_tcp_down: u16,
    pub port_udp: u16,
}

/// `[cpu]` section: thread-to-core pinning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuConfig {
    pub core_system: Option<usize>,
    pub core_network: Option<usize>,
    pub core_gateway: Option<usize>,
    pub cores_app: Vec<usize>,
}

impl CpuConfig {
    /// Validates the "pairwise disjoint" invariant from spec §5.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = std::collections::HashSet::new();
        for core in [self.core_system, self.core_network, self.core_gateway]
            .into_iter()
            .flatten()
            .chain(self.cores_app.iter().copied())
        {
            if !seen.insert(core) {
                return Err(CoreError::Configuration(format!(
                    "core {core} assigned to more than one role"
                )));
            }
        }
        Ok(())
    }

    /// Shard count `W`, defaulting to 1 when `cores_app` is unset (spec §4.14).
    pub fn shard_count(&self) -> usize {
        self.cores_app.len().max(1)
    }
}

/// `[rates]` section: timer periods in microseconds/milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatesConfig {
    pub price_feed_rate_us: u64,
    pub monitor_rate_ms: u64,
    pub telemetry_ms: u64,
}

/// `[shm]` section: shared-memory file paths and region size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmConfig {
    pub shm_upstream: String,
    pub shm_downstream: String,
    pub shm_telemetry: String,
    pub shm_size: usize,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub output: String,
    pub level: String,
}

/// Aggregate configuration, built from the five INI sections in spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub network: NetworkConfig,
    pub cpu: CpuConfig,
    pub rates: RatesConfig,
    pub shm: ShmConfig,
    pub log: LogConfig,
}

impl Config {
    /// Parses an INI-like document: `[section]` headers, `key = value`
    /// lines, `;`/`#` comments, blank lines ignored. Unknown keys are
    /// ignored rather than rejected, so the config file can carry keys
    /// meant for the external collaborators in spec §1.
    pub fn from_str(text: &str) -> CoreResult<Self> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = stripped.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let get = |section: &str, key: &str| -> CoreResult<String> {
            sections
                .get(section)
                .and_then(|s| s.get(key))
                .cloned()
                .ok_or_else(|| {
                    CoreError::Configuration(format!("missing key {section}.{key}"))
                })
        };
        let parse = |section: &str, key: &str| -> CoreResult<u64> {
            get(section, key)?
                .parse::<u64>()
                .map_err(|e| CoreError::Configuration(format!("{section}.{key}: {e}")))
        };

        let network = NetworkConfig {
            url: get("network", "url")?,
            port_tcp_up: parse("network", "port_tcp_up")? as u16,
            port_tcp_down: parse("network", "port_tcp_down")? as u16,
            port_udp: parse("network", "port_udp")? as u16,
        };

        let cores_app = sections
            .get("cpu")
            .and_then(|s| s.get("cores_app"))
            .map(|v| {
                v.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| usize::from_str(s.trim()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| CoreError::Configuration(format!("cpu.cores_app: {e}")))?
            .unwrap_or_default();
        let opt_core = |key: &str| -> Option<usize> {
            sections
                .get("cpu")
                .and_then(|s| s.get(key))
                .and_then(|v| v.parse().ok())
        };
        let cpu = CpuConfig {
            core_system: opt_core("core_system"),
            core_network: opt_core("core_network"),
            core_gateway: opt_core("core_gateway"),
            cores_app,
        };
        cpu.validate()?;

        let rates = RatesConfig {
            price_feed_rate_us: parse("rates", "price_feed_rate_us")?,
            monitor_rate_ms: parse("rates", "monitor_rate_ms")?,
            telemetry_ms: parse("rates", "telemetry_ms")?,
        };

        let shm = ShmConfig {
            shm_upstream: get("shm", "shm_upstream")?,
            shm_downstream: get("shm", "shm_downstream")?,
            shm_telemetry: get("shm", "shm_telemetry")?,
            shm_size: parse("shm", "shm_size")? as usize,
        };

        let log = LogConfig {
            output: get("log", "output")?,
            level: get("log", "level")?,
        };

        Ok(Config {
            network,
            cpu,
            rates,
            shm,
            log,
        })
    }

    /// Reads `path` and parses it the same way as [`Config::from_str`].
    /// Locating the *default* config path is a process-level concern out
    /// of scope here (spec §1); this just takes whatever path the caller
    /// resolved.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Configuration(format!("reading {}: {e}", path.as_ref().display()))
        })?;
        Self::from_str(&text)
    }
}
