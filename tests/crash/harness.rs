//! Crash test harness for subprocess management
//!
//! - Starts the slotanchor binary
//! - Injects crashes via env var
//! - Validates post-crash state

use std::path::Path;
use std::process::{Command, ExitStatus};

/// Result of a crash test execution
#[derive(Debug)]
pub struct CrashTestResult {
    /// Whether the process died without a clean exit
    pub crashed: bool,
    /// Exit status if available
    pub exit_status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CrashTestResult {
    /// True if the crash point fired (as opposed to an ordinary error exit)
    pub fn hit_crash_point(&self) -> bool {
        self.stderr.contains("[CRASH] Triggering crash at point")
    }
}

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_slotanchor")
}

/// Run the binary with `args`, optionally with a crash point enabled
pub fn execute_with_crash_point(crash_point: Option<&str>, args: &[&str]) -> CrashTestResult {
    let mut command = Command::new(binary());
    command.args(args).env_remove("SLOTANCHOR_CRASH_POINT");
    if let Some(point) = crash_point {
        command.env("SLOTANCHOR_CRASH_POINT", point);
    }

    match command.output() {
        Ok(output) => CrashTestResult {
            crashed: !output.status.success(),
            exit_status: Some(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        },
        Err(e) => CrashTestResult {
            crashed: true,
            exit_status: None,
            stdout: String::new(),
            stderr: format!("Failed to execute: {}", e),
        },
    }
}

/// `slotanchor create` against the config at `config_path`
pub fn create_slot(
    crash_point: Option<&str>,
    config_path: &Path,
    slot: &str,
    lsn: &str,
    temporary: bool,
) -> CrashTestResult {
    let config = config_path.to_string_lossy().into_owned();
    let mut args = vec![
        "create", "--config", config.as_str(), "--role", "postgres", "--slot", slot, "--plugin",
        "test_decoding", "--lsn", lsn,
    ];
    if temporary {
        args.push("--temporary");
    }
    execute_with_crash_point(crash_point, &args)
}

/// `slotanchor drop` against the config at `config_path`
pub fn drop_slot(crash_point: Option<&str>, config_path: &Path, slot: &str) -> CrashTestResult {
    let config = config_path.to_string_lossy().into_owned();
    execute_with_crash_point(
        crash_point,
        &["drop", "--config", config.as_str(), "--role", "postgres", "--slot", slot],
    )
}

/// Validate that the data directory is in a consistent state after crash
///
/// Must be called after the directory has been reopened, since reopening
/// is what clears crash debris.
pub fn validate_post_crash_state(data_dir: &Path) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = super::utils::validate_no_partial_files(data_dir) {
        errors.push(format!("Partial files: {}", e));
    }

    if let Err(e) = super::utils::validate_only_persistent_states(data_dir) {
        errors.push(format!("Slot states: {}", e));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Report crash test failure
pub fn report_failure(crash_point: &str, operation: &str, result: &CrashTestResult) {
    eprintln!("=== CRASH TEST FAILURE ===");
    eprintln!("Crash point: {}", crash_point);
    eprintln!("Operation: {}", operation);
    eprintln!("Exit status: {:?}", result.exit_status);
    eprintln!("stdout:\n{}", result.stdout);
    eprintln!("stderr:\n{}", result.stderr);
    eprintln!("==========================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::utils::TestServer;

    #[test]
    fn test_validate_post_crash_state_empty_dir() {
        let server = TestServer::new();
        server.reopen().unwrap();
        assert!(validate_post_crash_state(&server.data_dir()).is_ok());
    }

    #[test]
    fn test_clean_run_does_not_crash() {
        let server = TestServer::new();
        let result = create_slot(None, &server.config_path(), "clean", "0/10000000", false);
        if result.crashed {
            report_failure("none", "create", &result);
        }
        assert!(!result.crashed);
        assert!(!result.hit_crash_point());
    }
}
