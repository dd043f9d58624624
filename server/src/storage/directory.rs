use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const RECORDING_FILE: &str = "recording.json.gz";
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Standard recording root when none is configured
pub fn default_data_directory() -> PathBuf {
    PathBuf::from("/tmp/spectator_recordings")
}

/// Ensure the recording root exists
pub fn ensure_data_directory(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create data directory: {:?}", dir))?;
    Ok(dir.to_path_buf())
}

/// Isolated recording root for tests
pub fn test_data_directory(test_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("spectator_recordings_{}_{}", test_name, uuid::Uuid::new_v4()))
}

/// Removes recording files left half-written by an interrupted save.
/// Layout is `{root}/{region}/{match_id}/recording.json.gz.partial`.
pub fn cleanup_partial_recordings(root: &Path) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for region in fs::read_dir(root)? {
        let region = region?.path();
        if !region.is_dir() {
            continue;
        }
        for game in fs::read_dir(&region)? {
            let partial = game?.path().join(format!("{}{}", RECORDING_FILE, PARTIAL_SUFFIX));
            if partial.exists() {
                fs::remove_file(&partial)?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_only_partial_files() {
        let root = test_data_directory("cleanup");
        let game = root.join("EUW").join("12");
        fs::create_dir_all(&game).unwrap();
        fs::write(game.join(RECORDING_FILE), b"done").unwrap();
        fs::write(game.join(format!("{}{}", RECORDING_FILE, PARTIAL_SUFFIX)), b"half").unwrap();

        assert_eq!(cleanup_partial_recordings(&root).unwrap(), 1);
        assert!(game.join(RECORDING_FILE).exists());
        assert_eq!(cleanup_partial_recordings(&root).unwrap(), 0);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_root_is_empty() {
        let root = test_data_directory("missing");
        assert_eq!(cleanup_partial_recordings(&root).unwrap(), 0);
    }
}
