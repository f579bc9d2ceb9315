//! Crash testing utilities
//!
//! - A throwaway server data directory with a config file
//! - Reopening the directory the way a restarted server would
//! - Checking what the crash left behind

use std::fs;
use std::path::{Path, PathBuf};

use slotanchor::anchor::SlotAnchorService;
use slotanchor::auth::RoleDefinition;
use slotanchor::config::ServerConfig;
use slotanchor::errors::SlotResult;
use tempfile::TempDir;

/// Data directory plus config file for one crash scenario.
///
/// The server is on timeline 2, which branched from timeline 1 at
/// 0/20000000, so anchors below that are accepted without `--force`.
pub struct TestServer {
    tmp: TempDir,
    config: ServerConfig,
}

impl TestServer {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let mut config = ServerConfig::new(tmp.path().join("data").to_string_lossy().into_owned());
        config.current_timeline = 2;
        config.next_xid = 700;
        config.log_level = "warn".to_string();
        config.roles = vec![RoleDefinition::new("postgres").superuser()];

        let history_dir = config.history_dir();
        fs::create_dir_all(&history_dir).expect("Failed to create history dir");
        fs::write(
            history_dir.join("00000002.history"),
            "1\t0/20000000\tno recovery target specified\n",
        )
        .expect("Failed to write history file");

        let content = serde_json::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(tmp.path().join("slotanchor.json"), content).expect("Failed to write config");

        Self { tmp, config }
    }

    pub fn config_path(&self) -> PathBuf {
        self.tmp.path().join("slotanchor.json")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.data_path().to_path_buf()
    }

    /// Open the data directory as a restarted server would
    pub fn reopen(&self) -> SlotResult<SlotAnchorService> {
        SlotAnchorService::open(&self.config)
    }
}

fn replslot(data_dir: &Path) -> PathBuf {
    data_dir.join("replslot")
}

/// No `*.tmp` files or directories anywhere under the slot root
pub fn validate_no_partial_files(data_dir: &Path) -> Result<(), String> {
    let root = replslot(data_dir);
    if !root.exists() {
        return Ok(());
    }

    let mut pending = vec![root];
    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).map_err(|e| format!("Cannot read {}: {}", dir.display(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| format!("Cannot read entry: {}", e))?;
            let path = entry.path();
            if path.to_string_lossy().ends_with(".tmp") {
                return Err(format!("Leftover temp path {}", path.display()));
            }
            if path.is_dir() {
                pending.push(path);
            }
        }
    }
    Ok(())
}

/// Every slot directory holds a persistent state file
pub fn validate_only_persistent_states(data_dir: &Path) -> Result<(), String> {
    let root = replslot(data_dir);
    if !root.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(&root).map_err(|e| format!("Cannot read slot root: {}", e))? {
        let entry = entry.map_err(|e| format!("Cannot read entry: {}", e))?;
        let state = entry.path().join("state");
        let content = fs::read_to_string(&state)
            .map_err(|e| format!("Cannot read {}: {}", state.display(), e))?;
        let parsed: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid {}: {}", state.display(), e))?;
        if parsed["data"]["persistency"] != "persistent" {
            return Err(format!(
                "{} has persistency {}",
                state.display(),
                parsed["data"]["persistency"]
            ));
        }
    }
    Ok(())
}

/// Names of slot directories on disk, sorted
pub fn slot_dirs(data_dir: &Path) -> Vec<String> {
    let root = replslot(data_dir);
    if !root.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
