//! Bridge configuration
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! cross_thread = "block"
//! max_arguments = 10
//! require_constructor = true
//! log_subscriber_errors = true
//! finalize_host_owned = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Default ceiling on arguments per call or emission
pub const DEFAULT_MAX_ARGUMENTS: usize = 10;

/// How emissions from threads other than the host thread are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossThreadPolicy {
    /// Queue the emission; the host thread delivers it in `process_pending`
    #[default]
    Queue,
    /// The emitting thread waits for the host lock and dispatches itself;
    /// if the lock stays busy the emission is queued
    Block,
}

/// Bridge options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeOptions {
    /// Delivery policy for cross-thread emissions
    pub cross_thread: CrossThreadPolicy,

    /// Maximum number of arguments accepted per call or emission
    pub max_arguments: usize,

    /// Refuse to register classes without constructors
    pub require_constructor: bool,

    /// Log subscriber failures when no error hook is installed
    pub log_subscriber_errors: bool,

    /// Destroy host-owned native instances when their proxy is released
    pub finalize_host_owned: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            cross_thread: CrossThreadPolicy::Queue,
            max_arguments: DEFAULT_MAX_ARGUMENTS,
            require_constructor: true,
            log_subscriber_errors: true,
            finalize_host_owned: true,
        }
    }
}

impl BridgeOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        let options: Self =
            toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> BridgeResult<String> {
        toml::to_string(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    fn validate(&self) -> BridgeResult<()> {
        if self.max_arguments == 0 {
            return Err(BridgeError::Config(
                "max_arguments must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
