use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Expand `~` and environment variables in a path string
pub fn expand_path_str(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| path.into())
        .into_owned()
}

/// Expand a PathBuf with environment variables
pub fn expand_path_buf(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_path_str(&path_str))
}

/// Resolve the directory the benchmark is launched from to a canonical path
pub fn resolve_working_dir(path: &Path) -> Result<PathBuf> {
    let expanded = expand_path_buf(path);

    let canonical = expanded
        .canonicalize()
        .with_context(|| format!("Failed to resolve working directory: {expanded:?}"))?;

    if !canonical.is_dir() {
        anyhow::bail!("Working directory is not a directory: {}", canonical.display());
    }

    debug!("Using working directory: {}", canonical.display());
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_expand_env_var() {
        std::env::set_var("BENCHLAUNCH_TEST_DIR", "/tmp/bench");
        assert_eq!(expand_path_str("$BENCHLAUNCH_TEST_DIR/run"), "/tmp/bench/run");
        std::env::remove_var("BENCHLAUNCH_TEST_DIR");
    }

    #[test]
    fn test_expand_unknown_var_is_left_alone() {
        assert_eq!(
            expand_path_str("$BENCHLAUNCH_SURELY_UNSET_VAR/x"),
            "$BENCHLAUNCH_SURELY_UNSET_VAR/x"
        );
    }

    #[test]
    fn test_resolve_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_working_dir(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(resolve_working_dir(&file).is_err());
        assert!(resolve_working_dir(&dir.path().join("missing")).is_err());
    }
}
