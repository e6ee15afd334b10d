//! Domain resolution for the upstream ads.txt request
//!
//! The domain sent upstream comes from, in order: the configured site URL,
//! the server name, the request's `Host` header.

/// Per-request values that take part in domain resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Name the server is configured to answer as
    pub server_name: Option<String>,
    /// `Host` header of the inbound request
    pub host: Option<String>,
}

impl RequestContext {
    pub fn new(server_name: Option<String>, host: Option<String>) -> Self {
        Self { server_name, host }
    }
}

/// Reduces a site URL to a bare domain
///
/// Every occurrence of `https://`, `http://` and `www.` is removed, wherever it
/// appears, then a single trailing `/` is dropped.
pub fn strip_site_url(site_url: &str) -> String {
    let stripped = site_url
        .replace("https://", "")
        .replace("http://", "")
        .replace("www.", "");

    match stripped.strip_suffix('/') {
        Some(without_slash) => without_slash.to_string(),
        None => stripped,
    }
}

/// Resolves the domain to request the ads.txt document for
///
/// A non-empty site URL always wins, even if stripping leaves nothing. Empty
/// server names and host headers count as absent.
pub fn resolve_domain(site_url: Option<&str>, ctx: &RequestContext) -> Option<String> {
    if let Some(url) = site_url.filter(|url| !url.is_empty()) {
        return Some(strip_site_url(url));
    }

    ctx.server_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| ctx.host.as_deref().filter(|host| !host.is_empty()))
        .map(str::to_string)
}
