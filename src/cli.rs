//! Command-line interface parsing for adstxt-relay
//!
//! Every setting is a global flag with an `ADSTXT_*` environment fallback so
//! the relay can be configured the same way from a shell or a service unit.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::fetch::DEFAULT_ENDPOINT;

/// adstxt-relay - keep a site's ads.txt in sync with the publisher network
#[derive(Parser, Debug)]
#[command(name = "adstxt-relay")]
#[command(about = "Fetches, caches and serves a remote ads.txt file")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// What to do; serves over HTTP when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Pre-warm the cache, then serve /ads.txt until interrupted
    ///
    /// The daily forced refresh is registered by the first request for any
    /// other path. Behind a proxy that forwards only /ads.txt it never starts
    /// and content refreshes when the cached copy expires.
    Serve,
    /// Force a fetch from the upstream endpoint and update the cache
    Refresh,
    /// Print the content /ads.txt would serve right now
    Show,
}

#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Canonical site URL; its domain is sent upstream
    #[arg(long, global = true, env = "ADSTXT_SITE_URL", value_name = "URL")]
    pub site_url: Option<String>,

    /// Name this server answers as, used when no site URL is set
    #[arg(long, global = true, env = "ADSTXT_SERVER_NAME", value_name = "NAME")]
    pub server_name: Option<String>,

    /// Extra ads.txt lines appended after the fetched document
    #[arg(
        long,
        global = true,
        env = "ADSTXT_EXTRA_PARAMS",
        value_name = "TEXT",
        conflicts_with = "extra_params_file"
    )]
    pub extra_params: Option<String>,

    /// File holding the extra lines, re-read on every request
    #[arg(long, global = true, env = "ADSTXT_EXTRA_PARAMS_FILE", value_name = "PATH")]
    pub extra_params_file: Option<PathBuf>,

    /// Upstream endpoint prefix the domain is appended to
    #[arg(long, global = true, env = "ADSTXT_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Directory for the cached document (defaults to the XDG cache dir)
    #[arg(long, global = true, env = "ADSTXT_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Address the HTTP server listens on
    #[arg(long, global = true, env = "ADSTXT_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Upstream request timeout in seconds
    #[arg(long, global = true, env = "ADSTXT_FETCH_TIMEOUT", default_value_t = 5, value_name = "SECS")]
    pub fetch_timeout: u64,

    /// Seconds between scheduled forced refreshes
    #[arg(long, global = true, env = "ADSTXT_REFRESH_INTERVAL", default_value_t = 86_400, value_name = "SECS")]
    pub refresh_interval: u64,

    /// Serve the document without HTML-escaping it
    #[arg(long, global = true)]
    pub no_escape: bool,
}

impl Cli {
    /// The requested command, `serve` when none was given
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
