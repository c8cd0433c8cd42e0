//! Invocation configuration.
//!
//! Everything the handshake needs is passed in explicitly: the engine never
//! reads the ambient process environment, arguments, or working directory.
//! Callers that want them pass `std::env` values themselves.
//!
//! # Example
//!
//! ```
//! use nailpin::NailConfig;
//!
//! let config = NailConfig::new("io.foldr.ngtesthost.Stdout")
//!     .with_args(["--verbose"])
//!     .with_env([("LANG", "C")])
//!     .with_cwd("/tmp");
//!
//! assert_eq!(config.host, nailpin::config::DEFAULT_HOST);
//! assert_eq!(config.port, nailpin::config::DEFAULT_PORT);
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{NailpinError, Result};

/// Default remote host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default remote port.
pub const DEFAULT_PORT: u16 = 2113;

/// Configuration for one remote invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NailConfig {
    /// Remote entry point to invoke. Required.
    pub command: String,
    /// Arguments, sent in order.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment entries, sent as `KEY=VALUE`. Entry order is preserved
    /// so a single run produces a stable handshake.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Remote working directory.
    #[serde(default = "default_cwd")]
    pub cwd: String,
    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_cwd() -> String {
    ".".to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl NailConfig {
    /// Create a configuration for the given remote command with defaults:
    /// no arguments, no environment entries, cwd `"."`, endpoint
    /// `localhost:2113`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: default_cwd(),
            host: default_host(),
            port: default_port(),
        }
    }

    /// Set the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the environment entries.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the remote working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Set the server host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Validate the configuration.
    ///
    /// Rejects a missing command name. Called by `Session::open` before any
    /// transport activity.
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(NailpinError::Config(
                "no command provided".to_string(),
            ));
        }
        Ok(())
    }
}
