//! adstxt-relay library
//!
//! Fetches a site's ads.txt document from the publisher network, caches it for
//! a day, appends locally configured lines and serves the result at `/ads.txt`.

pub mod app;
pub mod cache;
pub mod cli;
pub mod compose;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod refresh;
pub mod schedule;
pub mod server;
