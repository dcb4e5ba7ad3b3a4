//! Host environment checks run at startup.

/// Exit code used when a required program is missing.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Returns true when running on Linux.
pub fn is_linux() -> bool {
    cfg!(target_os = "linux")
}

/// Returns true if `name` resolves to an executable on `PATH`.
pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}
