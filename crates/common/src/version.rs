//! Cache version fingerprint computation.
//!
//! The version binds a cache entry to the exact set of inputs that produced
//! it: the ordered path selectors, the compression method, and (on Windows,
//! unless cross-OS archives are explicitly allowed) a platform marker.
//! Entries with different versions are unrelated caches even under the same
//! key, so the fingerprint must be byte-for-byte reproducible across
//! implementations sharing the same inputs.

use sha2::{Digest, Sha256};

use crate::constants::CACHE_VERSION_SALT;

/// Marker appended on Windows when cross-OS archives are not allowed.
const WINDOWS_ONLY_MARKER: &str = "windows-only";

/// Separator between fingerprint components. Not expected to appear in
/// path selectors or method tags.
const COMPONENT_SEPARATOR: &str = "|";

/// Compression method applied to a cache archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Gzip,
    Zstd,
}

impl CompressionMethod {
    /// Tag folded into the version fingerprint.
    pub fn tag(&self) -> &'static str {
        match self {
            CompressionMethod::Gzip => "gzip",
            CompressionMethod::Zstd => "zstd",
        }
    }
}

/// Compute the cache version fingerprint for the current platform.
///
/// Components are concatenated in order: all path selectors, the
/// compression tag if present, the Windows marker when applicable, and the
/// version salt. Insertion order of path selectors is significant and is
/// never normalized.
///
/// # Returns
/// 64-character lowercase hex SHA-256 digest.
pub fn compute_version(
    path_selectors: &[String],
    compression: Option<CompressionMethod>,
    cross_os_archive: bool,
) -> String {
    compute_version_for_platform(path_selectors, compression, cross_os_archive, cfg!(windows))
}

fn compute_version_for_platform(
    path_selectors: &[String],
    compression: Option<CompressionMethod>,
    cross_os_archive: bool,
    windows: bool,
) -> String {
    let mut components: Vec<&str> = path_selectors.iter().map(String::as_str).collect();

    if let Some(method) = compression {
        components.push(method.tag());
    }

    // Windows-produced archives are not portable to other platforms unless
    // the caller opts in, so the version must not collide across OSes.
    if windows && !cross_os_archive {
        components.push(WINDOWS_ONLY_MARKER);
    }

    components.push(CACHE_VERSION_SALT);

    let mut hasher = Sha256::new();
    hasher.update(components.join(COMPONENT_SEPARATOR).as_bytes());
    hex::encode(hasher.finalize())
}
