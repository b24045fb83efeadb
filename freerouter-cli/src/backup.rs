//! Timestamped copies of the generated config.
//!
//! Backups sit next to the config as `config.yaml.backup.YYYYmmdd_HHMMSS`;
//! only the newest [`KEEP`] are retained.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, warn};

pub const KEEP: usize = 5;

/// A backup file and its modification time.
#[derive(Debug, Clone)]
pub struct Backup {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl Backup {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn modified_display(&self) -> String {
        chrono::DateTime::<Local>::from(self.modified)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

fn prefix(config: &Path) -> String {
    let name = config
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{name}.backup.")
}

/// Copy `config` to a timestamped sibling and rotate old copies.
///
/// Returns `None` when there is nothing to back up.
pub fn create(config: &Path) -> Result<Option<PathBuf>> {
    if !config.is_file() {
        return Ok(None);
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut target = config.with_file_name(format!("{}{}", prefix(config), stamp));
    // Two backups in the same second get a counter suffix.
    let mut n = 1;
    while target.exists() {
        target = config.with_file_name(format!("{}{}_{}", prefix(config), stamp, n));
        n += 1;
    }

    fs::copy(config, &target)
        .with_context(|| format!("Failed to back up {}", config.display()))?;
    debug!(backup = %target.display(), "Created config backup");

    rotate(config, KEEP);
    Ok(Some(target))
}

/// Existing backups of `config`, newest first.
pub fn list(config: &Path) -> Vec<Backup> {
    let dir = match config.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = prefix(config);

    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut backups: Vec<Backup> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(Backup {
                path: entry.path(),
                modified,
            })
        })
        .collect();

    // Names embed the timestamp, so they break mtime ties.
    backups.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.path.cmp(&a.path))
    });
    backups
}

/// Delete all but the newest `keep` backups.
pub fn rotate(config: &Path, keep: usize) {
    for old in list(config).into_iter().skip(keep) {
        match fs::remove_file(&old.path) {
            Ok(()) => debug!("Removed old backup {}", old.file_name()),
            Err(e) => warn!("Failed to remove old backup {}: {}", old.file_name(), e),
        }
    }
}

/// Resolve a user-supplied backup reference: absolute paths as-is, bare
/// names relative to the config's directory.
pub fn locate(config: &Path, reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config.with_file_name(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn nothing_to_back_up() {
        let dir = TempDir::new().unwrap();
        assert!(create(&dir.path().join("config.yaml")).unwrap().is_none());
    }

    #[test]
    fn backup_copies_contents_with_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        fs::write(&config, "model_list: []\n").unwrap();

        let backup = create(&config).unwrap().unwrap();
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with("config.yaml.backup."));
        let stamp = &name["config.yaml.backup.".len()..];
        assert_eq!(stamp.len(), "20260101_120000".len());
        assert_eq!(fs::read_to_string(backup).unwrap(), "model_list: []\n");
    }

    #[test]
    fn rotation_keeps_the_newest_five() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        fs::write(&config, "x").unwrap();
        for i in 0..7 {
            fs::write(
                dir.path().join(format!("config.yaml.backup.2026010{}_000000", i)),
                "old",
            )
            .unwrap();
        }
        fs::write(dir.path().join("unrelated.yaml.backup.1"), "keep me").unwrap();

        rotate(&config, KEEP);

        let remaining = list(&config);
        assert_eq!(remaining.len(), KEEP);
        assert!(dir.path().join("unrelated.yaml.backup.1").exists());
    }

    #[test]
    fn repeated_backups_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        fs::write(&config, "x").unwrap();

        let a = create(&config).unwrap().unwrap();
        let b = create(&config).unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(list(&config).len(), 2);
    }

    #[test]
    fn locate_relative_and_absolute() {
        let config = Path::new("/srv/fr/config.yaml");
        assert_eq!(
            locate(config, "config.yaml.backup.20260101_000000"),
            PathBuf::from("/srv/fr/config.yaml.backup.20260101_000000")
        );
        assert_eq!(locate(config, "/tmp/b.yaml"), PathBuf::from("/tmp/b.yaml"));
    }
}
