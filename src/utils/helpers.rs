/// Helper utilities for the dockup CLI

use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};

use crate::utils::{DEFAULT_CONFIG_PATH, STATUS_DOWN};

/// Install the tracing subscriber. RUST_LOG wins over the verbose flag.
pub fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore the error if a subscriber is already installed (tests)
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve the config path: explicit flag, then DOCKUP_CONFIG, then default
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("DOCKUP_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Size of a file, 0 if it cannot be read
pub fn file_size<P: AsRef<Path>>(path: P) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Parse Docker container status to simplified state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Paused,
    Restarting,
    Down,
    Unknown,
}

impl From<&str> for ContainerState {
    fn from(status: &str) -> Self {
        if status == STATUS_DOWN {
            return ContainerState::Down;
        }

        let status_lower = status.to_lowercase();
        if status_lower.contains("paused") {
            ContainerState::Paused
        } else if status_lower.contains("restarting") {
            ContainerState::Restarting
        } else if status_lower.starts_with("up") || status_lower.contains("running") {
            ContainerState::Running
        } else if status_lower.contains("exited") || status_lower.contains("stopped") {
            ContainerState::Stopped
        } else {
            ContainerState::Unknown
        }
    }
}

impl ContainerState {
    /// Colorize a status string for terminal display
    pub fn paint(&self, text: &str) -> ColoredString {
        match self {
            ContainerState::Running => text.green(),
            ContainerState::Stopped => text.bright_black(),
            ContainerState::Paused => text.yellow(),
            ContainerState::Restarting => text.cyan(),
            ContainerState::Down => text.red(),
            ContainerState::Unknown => text.white(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_container_state_from_status() {
        assert_eq!(ContainerState::from("Up 3 hours"), ContainerState::Running);
        assert_eq!(ContainerState::from("Up 2 minutes (Paused)"), ContainerState::Paused);
        assert_eq!(ContainerState::from("Exited (0) 2 days ago"), ContainerState::Stopped);
        assert_eq!(ContainerState::from("Restarting (1) 5 seconds ago"), ContainerState::Restarting);
        assert_eq!(ContainerState::from("Down"), ContainerState::Down);
        assert_eq!(ContainerState::from("Created"), ContainerState::Unknown);
    }

    #[test]
    fn test_resolve_config_path_prefers_flag() {
        let path = resolve_config_path(Some(PathBuf::from("/etc/dockup.toml")));
        assert_eq!(path, PathBuf::from("/etc/dockup.toml"));
    }
}
