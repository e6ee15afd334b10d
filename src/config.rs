//! Runtime settings derived from the command line

use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;
use crate::fetch::{DEFAULT_ENDPOINT, DEFAULT_FETCH_TIMEOUT};

/// Errors for settings that parse but cannot be used
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Upstream endpoint is not an HTTP(S) URL
    #[error("Invalid endpoint: '{0}'. Expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    /// A duration setting is zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Where the extra ads.txt lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraParams {
    /// Fixed text (possibly unset)
    Inline(Option<String>),
    /// Text file read on every lookup; a missing file means no extra lines
    File(PathBuf),
}

impl Default for ExtraParams {
    fn default() -> Self {
        ExtraParams::Inline(None)
    }
}

impl ExtraParams {
    /// Current extra lines
    pub fn load(&self) -> Option<String> {
        match self {
            ExtraParams::Inline(text) => text.clone(),
            ExtraParams::File(path) => match fs::read_to_string(path) {
                Ok(text) => Some(text),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read extra params file");
                    None
                }
            },
        }
    }
}

/// Validated settings for the relay
#[derive(Debug, Clone)]
pub struct Settings {
    pub site_url: Option<String>,
    pub server_name: Option<String>,
    pub extra_params: ExtraParams,
    pub endpoint: String,
    /// `None` selects the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    pub listen: SocketAddr,
    pub fetch_timeout: Duration,
    pub refresh_interval: Duration,
    pub escape_html: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: None,
            server_name: None,
            extra_params: ExtraParams::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cache_dir: None,
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_interval: Duration::from_secs(86_400),
            escape_html: true,
        }
    }
}

impl Settings {
    /// Builds settings from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Settings)` with durations converted and extra params resolved
    /// * `Err(ConfigError)` if the endpoint or a duration is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let args = &cli.settings;

        if !(args.endpoint.starts_with("http://") || args.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(args.endpoint.clone()));
        }
        if args.fetch_timeout == 0 {
            return Err(ConfigError::ZeroDuration("fetch timeout"));
        }
        if args.refresh_interval == 0 {
            return Err(ConfigError::ZeroDuration("refresh interval"));
        }

        let extra_params = match &args.extra_params_file {
            Some(path) => ExtraParams::File(path.clone()),
            None => ExtraParams::Inline(args.extra_params.clone()),
        };

        Ok(Settings {
            site_url: args.site_url.clone(),
            server_name: args.server_name.clone(),
            extra_params,
            endpoint: args.endpoint.clone(),
            cache_dir: args.cache_dir.clone(),
            listen: args.listen,
            fetch_timeout: Duration::from_secs(args.fetch_timeout),
            refresh_interval: Duration::from_secs(args.refresh_interval),
            escape_html: !args.no_escape,
        })
    }
}
