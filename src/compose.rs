//! Joins the fetched document with the locally configured extra lines

/// Appends `extra` to `body` on a new line
///
/// An absent or empty body is returned untouched. An absent `extra` still
/// produces the separator, leaving a trailing newline.
pub fn compose(body: Option<String>, extra: Option<&str>) -> Option<String> {
    match body {
        Some(body) if !body.is_empty() => Some(format!("{}\n{}", body, extra.unwrap_or(""))),
        other => other,
    }
}
