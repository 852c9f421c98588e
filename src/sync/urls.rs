//! URL building utilities for the sync client.

/// Turn a user-supplied server address into a base URL.
///
/// A bare `host:port` gets an `http://` prefix; explicit `http://` and
/// `https://` URLs are kept. Trailing slashes are dropped.
pub fn normalize_server_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Build the URL for one protocol endpoint, e.g. `build_url(server, "sync")`.
pub fn build_url(server: &str, endpoint: &str) -> String {
    format!("{}/{}", server, endpoint.trim_start_matches('/'))
}

/// Normalize a path to use forward slashes regardless of OS.
///
/// Paths on the wire always use forward slashes, but on Windows
/// `to_string_lossy()` produces backslashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}
