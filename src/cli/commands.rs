//! CLI command implementations
//!
//! Each command loads configuration, opens the service (restoring slots
//! from disk), runs one operation in a fresh session and prints one JSON
//! response. The session ends with the command, so a temporary slot is
//! gone by the time the command exits.

use std::path::Path;

use serde_json::{json, Value};

use crate::anchor::{CreateAnchoredSlot, SlotAnchorService};
use crate::auth::Identity;
use crate::config::ServerConfig;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::session::Session;
use crate::types::ProcessId;

use super::args::Command;
use super::errors::CliResult;
use super::io::write_response;

/// Run a command and print its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = execute(cmd)?;
    write_response(data)
}

/// Run a command and return the response payload
pub fn execute(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Create {
            config,
            role,
            slot,
            plugin,
            lsn,
            temporary,
            force,
        } => {
            let mut request = CreateAnchoredSlot::new(slot, plugin, lsn);
            request.temporary = temporary;
            request.force = force;
            create(&config, &role, &request)
        }
        Command::Drop { config, role, slot } => drop_slot(&config, &role, &slot),
        Command::List { config } => list(&config),
    }
}

fn open(config_path: &Path) -> CliResult<(ServerConfig, SlotAnchorService)> {
    let config = ServerConfig::load(config_path)?;
    Logger::set_min_severity(config.log_severity());

    let timeline = config.timeline().to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("data_dir", config.data_dir.as_str()), ("timeline", timeline.as_str())],
    );

    let service = SlotAnchorService::open(&config)?;
    Ok((config, service))
}

fn session(config: &ServerConfig, role: &str) -> Session {
    Session::new(ProcessId::current(), Identity::new(role), config.database.clone())
}

/// Create an anchored slot
pub fn create(config_path: &Path, role: &str, request: &CreateAnchoredSlot) -> CliResult<Value> {
    let (config, service) = open(config_path)?;
    let session = session(&config, role);

    let result = service.create_logical_replication_slot_lsn(&session, request);
    service.end_session(&session);

    let created = result?;
    Ok(serde_json::to_value(&created)?)
}

/// Drop a slot
pub fn drop_slot(config_path: &Path, role: &str, slot: &str) -> CliResult<Value> {
    let (config, service) = open(config_path)?;
    let session = session(&config, role);

    let result = service.drop_replication_slot(&session, slot);
    service.end_session(&session);
    result?;

    Ok(json!({ "dropped": slot }))
}

/// List all slots
pub fn list(config_path: &Path) -> CliResult<Value> {
    let (_, service) = open(config_path)?;
    Ok(json!({ "slots": service.list_slots() }))
}
