//! Runner configuration file
//!
//! ```toml
//! log_level = "debug"
//!
//! [bridge]
//! cross_thread = "block"
//! max_arguments = 10
//! ```

use anyhow::anyhow;
use log::LevelFilter;
use serde::Deserialize;
use slotbridge_engine::BridgeOptions;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: Option<String>,
    pub bridge: BridgeOptions,
}

impl CliConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        // options validation lives with the engine
        let options = toml::to_string(&config.bridge)?;
        BridgeOptions::from_toml_str(&options)?;
        if let Some(level) = &config.log_level {
            level
                .parse::<LevelFilter>()
                .map_err(|e| anyhow!("invalid log_level '{}': {}", level, e))?;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// `--verbose` wins over the file; warnings are shown by default
    pub fn log_level(&self, verbose: bool) -> LevelFilter {
        if verbose {
            return LevelFilter::Debug;
        }
        self.log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or(LevelFilter::Warn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbridge_engine::CrossThreadPolicy;

    #[test]
    fn test_parse_config() {
        let config = CliConfig::parse(
            "log_level = \"info\"\n[bridge]\ncross_thread = \"block\"\nmax_arguments = 4\n",
        )
        .unwrap();
        assert_eq!(config.bridge.cross_thread, CrossThreadPolicy::Block);
        assert_eq!(config.bridge.max_arguments, 4);
        assert_eq!(config.log_level(false), LevelFilter::Info);
        assert_eq!(config.log_level(true), LevelFilter::Debug);
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert_eq!(config.bridge, BridgeOptions::default());
        assert_eq!(config.log_level(false), LevelFilter::Warn);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CliConfig::parse("log_level = \"loud\"").is_err());
        assert!(CliConfig::parse("[bridge]\nmax_arguments = 0\n").is_err());
        assert!(CliConfig::parse("colour = true").is_err());
    }
}
