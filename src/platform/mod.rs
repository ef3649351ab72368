use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole data directory.
pub const DATA_DIR_ENV: &str = "MAINTOPS_DATA_DIR";

/// Platform-specific operations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Root data directory holding `config.toml` and the database.
    fn data_dir() -> PathBuf;
}

/// `$MAINTOPS_DATA_DIR` when set and non-empty, else the platform default.
pub(crate) fn resolve_data_dir(default: PathBuf) -> PathBuf {
    resolve_data_dir_with(|key| std::env::var(key).ok(), default)
}

pub(crate) fn resolve_data_dir_with<F>(lookup: F, default: PathBuf) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(DATA_DIR_ENV) {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ => default,
    }
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
