//! Config directory and well-known file paths for freerouter.
//!
//! freerouter looks for configuration in two places: a project-level
//! `./config` directory next to where it is invoked, and a user-level
//! XDG directory (`~/.config/freerouter`). The project directory wins when
//! it exists.

use std::path::{Path, PathBuf};

/// Provider declaration file name.
pub const PROVIDERS_FILE: &str = "providers.yaml";

/// Generated proxy configuration file name.
pub const OUTPUT_FILE: &str = "config.yaml";

/// Proxy log file name, written next to the generated configuration.
pub const LOG_FILE: &str = "freerouter.log";

/// Supervisor state file name, written next to the generated configuration.
pub const PID_FILE: &str = "freerouter.pid";

/// Get the freerouter user config directory.
///
/// Returns `$XDG_CONFIG_HOME/freerouter` if set, otherwise `~/.config/freerouter`.
///
/// # Examples
///
/// ```
/// use freerouter_paths::config_dir;
///
/// let config = config_dir();
/// let providers = config.join("providers.yaml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("freerouter")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/freerouter")
    } else {
        PathBuf::from(".config/freerouter")
    }
}

/// Get the project config directory (`./config`).
///
/// `FREEROUTER_PROJECT_DIR` overrides the base directory, which keeps
/// tests isolated from the real working directory.
pub fn project_dir() -> PathBuf {
    match std::env::var("FREEROUTER_PROJECT_DIR") {
        Ok(dir) => PathBuf::from(dir).join("config"),
        Err(_) => PathBuf::from("config"),
    }
}

/// Directories searched for `providers.yaml`, in priority order.
pub fn search_dirs() -> [PathBuf; 2] {
    [project_dir(), config_dir()]
}

/// Find the first existing provider declaration file.
pub fn find_providers_file() -> Option<PathBuf> {
    search_dirs()
        .into_iter()
        .map(|dir| dir.join(PROVIDERS_FILE))
        .find(|path| path.is_file())
}

/// Directory the generated configuration lives in.
///
/// The project directory is used when it already exists, otherwise the
/// user config directory. The directory is not created here.
pub fn output_dir() -> PathBuf {
    let project = project_dir();
    if project.is_dir() { project } else { config_dir() }
}

/// Path of the generated proxy configuration.
pub fn output_file() -> PathBuf {
    output_dir().join(OUTPUT_FILE)
}

/// Log file path that belongs to a given output configuration.
pub fn log_file_for(output: &Path) -> PathBuf {
    sibling(output, LOG_FILE)
}

/// Supervisor state file path that belongs to a given output configuration.
pub fn pid_file_for(output: &Path) -> PathBuf {
    sibling(output, PID_FILE)
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_ends_with_freerouter() {
        let path = config_dir();
        assert!(
            path.ends_with("freerouter"),
            "config_dir should end with 'freerouter'"
        );
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-config/freerouter"));
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    #[serial]
    fn test_project_dir_respects_override() {
        unsafe {
            std::env::set_var("FREEROUTER_PROJECT_DIR", "/tmp/project");
        }
        assert_eq!(project_dir(), PathBuf::from("/tmp/project/config"));
        unsafe {
            std::env::remove_var("FREEROUTER_PROJECT_DIR");
        }
    }

    #[test]
    #[serial]
    fn test_search_dirs_prefers_project() {
        unsafe {
            std::env::set_var("FREEROUTER_PROJECT_DIR", "/tmp/project");
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg");
        }
        let dirs = search_dirs();
        assert_eq!(dirs[0], PathBuf::from("/tmp/project/config"));
        assert_eq!(dirs[1], PathBuf::from("/tmp/xdg/freerouter"));
        unsafe {
            std::env::remove_var("FREEROUTER_PROJECT_DIR");
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    fn test_sibling_files_share_directory() {
        let output = Path::new("/srv/freerouter/config.yaml");
        assert_eq!(
            log_file_for(output),
            PathBuf::from("/srv/freerouter/freerouter.log")
        );
        assert_eq!(
            pid_file_for(output),
            PathBuf::from("/srv/freerouter/freerouter.pid")
        );
    }

    #[test]
    fn test_sibling_of_bare_file_name() {
        assert_eq!(
            pid_file_for(Path::new("config.yaml")),
            PathBuf::from("freerouter.pid")
        );
    }
}
