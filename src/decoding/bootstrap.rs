//! Decoding context creation and start point search

use super::plugin::PluginRegistry;
use super::reader::{WalReader, WAL_SEGMENT_SIZE};
use super::snapbuild::{SnapBuildState, SnapshotBuilder};
use crate::crash_point::{maybe_crash, points};
use crate::errors::{SlotError, SlotResult};
use crate::observability::{log_event_with_fields, Event};
use crate::session::Session;
use crate::slot::{SlotHandle, SlotKind};
use crate::types::{Lsn, TransactionId};

/// How much work `bootstrap` does beyond validation and pinning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Also hold back the data horizon until the slot is released
    pub need_full_snapshot: bool,
    /// Scan WAL from the anchor for a consistent start point
    pub need_startpoint_search: bool,
}

/// A decoding context bound to one acquired slot.
///
/// Dropping the context closes any WAL segment it still has open.
pub struct DecodingContext<'r> {
    slot_name: String,
    plugin: String,
    start_lsn: Lsn,
    catalog_xmin: TransactionId,
    reader: Option<&'r mut dyn WalReader>,
    open_segment: Option<u64>,
}

impl std::fmt::Debug for DecodingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodingContext")
            .field("slot_name", &self.slot_name)
            .field("plugin", &self.plugin)
            .field("start_lsn", &self.start_lsn)
            .field("catalog_xmin", &self.catalog_xmin)
            .field("open_segment", &self.open_segment)
            .finish()
    }
}

impl<'r> DecodingContext<'r> {
    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn start_lsn(&self) -> Lsn {
        self.start_lsn
    }

    pub fn catalog_xmin(&self) -> TransactionId {
        self.catalog_xmin
    }

    /// Scan forward from the start position until the snapshot builder
    /// is consistent, then move the slot's `confirmed_flush` there.
    ///
    /// There is no timeout; the scan ends at consistency, at the end of
    /// available WAL, or on a read error.
    pub fn find_startpoint(&mut self, handle: &SlotHandle<'_>) -> SlotResult<Lsn> {
        let mut builder = SnapshotBuilder::new(self.catalog_xmin);
        let mut at = self.start_lsn;

        let found = loop {
            let record = self.read_record(at)?;
            let Some(record) = record else {
                return Err(SlotError::NoConsistentPoint { from: self.start_lsn });
            };
            if record.end <= at {
                return Err(SlotError::Corruption(format!(
                    "WAL record at {} does not advance past {}",
                    record.lsn, at
                )));
            }

            if builder.process(&record) == SnapBuildState::Consistent {
                break builder.consistent_at().unwrap_or(record.end);
            }
            at = record.end;
        };

        handle.set_confirmed_flush(found);
        let found_str = found.to_string();
        let start_str = self.start_lsn.to_string();
        log_event_with_fields(
            Event::StartpointFound,
            &[
                ("slot", self.slot_name.as_str()),
                ("from", start_str.as_str()),
                ("confirmed_flush", found_str.as_str()),
            ],
        );
        Ok(found)
    }

    fn read_record(&mut self, at: Lsn) -> SlotResult<Option<super::reader::WalRecord>> {
        let Some(reader) = self.reader.as_deref_mut() else {
            return Err(SlotError::DecodingRequirements(
                "start point search requires a WAL reader".to_string(),
            ));
        };

        let segno = at.segment_number(WAL_SEGMENT_SIZE);
        if self.open_segment != Some(segno) {
            if self.open_segment.take().is_some() {
                reader.segment_close();
            }
            reader
                .segment_open(segno)
                .map_err(|source| SlotError::WalRead { lsn: at, source })?;
            self.open_segment = Some(segno);
        }

        reader
            .read_record(at)
            .map_err(|source| SlotError::WalRead { lsn: at, source })
    }
}

impl Drop for DecodingContext<'_> {
    fn drop(&mut self) {
        if self.open_segment.take().is_some() {
            if let Some(reader) = self.reader.as_deref_mut() {
                reader.segment_close();
            }
        }
    }
}

/// Validates a slot for logical decoding and pins its catalog horizon.
#[derive(Debug, Clone, Default)]
pub struct DecodingBootstrap {
    plugins: PluginRegistry,
}

impl DecodingBootstrap {
    pub fn new(plugins: PluginRegistry) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Prepare `handle` for decoding with `plugin` from `anchor`.
    ///
    /// Checks run before anything is modified. The horizon is pinned and
    /// the slot saved before any WAL is read, so a failing search still
    /// unwinds through the handle.
    pub fn bootstrap<'r>(
        &self,
        session: &Session,
        handle: &SlotHandle<'_>,
        plugin: &str,
        anchor: Lsn,
        options: BootstrapOptions,
        reader: Option<&'r mut dyn WalReader>,
    ) -> SlotResult<DecodingContext<'r>> {
        self.plugins.validate(plugin)?;

        if handle.kind() != SlotKind::Logical {
            return Err(SlotError::PhysicalSlot(handle.name().to_string()));
        }

        let database = handle.database();
        if database != session.database() {
            return Err(SlotError::WrongDatabase {
                slot: handle.name().to_string(),
                database: session.database().to_string(),
            });
        }

        if session.transaction().has_writes() {
            return Err(SlotError::ActiveTransactionHasWrites);
        }

        if options.need_startpoint_search && reader.is_none() {
            return Err(SlotError::DecodingRequirements(
                "start point search requires a WAL reader".to_string(),
            ));
        }

        handle.set_plugin(plugin);

        let catalog_xmin = handle.reserve_catalog_horizon(options.need_full_snapshot);
        maybe_crash(points::SLOT_AFTER_HORIZON);

        handle.mark_dirty();
        handle.save()?;

        let mut ctx = DecodingContext {
            slot_name: handle.name().to_string(),
            plugin: plugin.to_string(),
            start_lsn: anchor,
            catalog_xmin,
            reader,
            open_segment: None,
        };

        if options.need_startpoint_search {
            ctx.find_startpoint(handle)?;
        }

        Ok(ctx)
    }
}
