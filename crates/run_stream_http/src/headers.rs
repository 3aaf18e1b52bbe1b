use std::collections::BTreeMap;

use crate::config::HttpStreamConfig;
use crate::payload::{RequestBody, StreamRequest};

pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the deterministic header set for one request.
///
/// Precedence, lowest first: defaults (`user-agent`, and `content-type` for
/// JSON bodies), configured extras, then the request's own headers. Keys are
/// lowercased. Form bodies never carry a `content-type` here; the multipart
/// encoder supplies one with its boundary.
pub fn build_headers(
    config: &HttpStreamConfig,
    request: &StreamRequest,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    let ua = match config.user_agent.as_deref() {
        Some(explicit) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    if request.body.is_json() {
        headers.insert(HEADER_CONTENT_TYPE.to_owned(), JSON_CONTENT_TYPE.to_owned());
    }

    for (key, value) in config.extra_headers.iter().chain(&request.headers) {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    if let RequestBody::Form(_) = request.body {
        if let Some(dropped) = headers.remove(HEADER_CONTENT_TYPE) {
            tracing::debug!(content_type = %dropped, "ignoring content-type for form body");
        }
    }

    headers
}

/// `run-stream/<version> (<os> <release>; <arch>)`, or without the
/// parenthesized part when the platform cannot be read.
pub fn default_user_agent() -> String {
    let product = concat!("run-stream/", env!("CARGO_PKG_VERSION"));
    match runtime_os_triplet() {
        Some((platform, release, arch)) => format!("{product} ({platform} {release}; {arch})"),
        None => product.to_owned(),
    }
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "amd64" => "x86_64".to_owned(),
        "i386" | "i686" => "x86".to_owned(),
        "arm64" => "aarch64".to_owned(),
        normalized => normalized.to_owned(),
    }
}

#[cfg(unix)]
fn runtime_os_triplet() -> Option<(String, String, String)> {
    use std::ffi::CStr;
    use std::mem::MaybeUninit;

    let mut raw = MaybeUninit::<libc::utsname>::uninit();
    // SAFETY: `uname` initializes the provided `utsname` struct on success.
    let rc = unsafe { libc::uname(raw.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }

    // SAFETY: `uname` returned success, so `raw` is initialized.
    let raw = unsafe { raw.assume_init() };
    // SAFETY: `uname` provides NUL-terminated fixed-size C strings.
    let platform = unsafe { CStr::from_ptr(raw.sysname.as_ptr()) }
        .to_string_lossy()
        .to_lowercase();
    // SAFETY: as above.
    let release = unsafe { CStr::from_ptr(raw.release.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    // SAFETY: as above.
    let arch = unsafe { CStr::from_ptr(raw.machine.as_ptr()) }.to_string_lossy();
    let arch = normalize_arch(&arch);

    if platform.is_empty() || release.is_empty() || arch.is_empty() {
        None
    } else {
        Some((platform, release, arch))
    }
}

#[cfg(not(unix))]
fn runtime_os_triplet() -> Option<(String, String, String)> {
    None
}
