//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` on drop if neither happened

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs the start and outcome of one operation.
///
/// Fields given at creation are repeated on every line so the lines of
/// one operation can be correlated.
pub struct ObservationScope {
    name: &'static str,
    closed: bool,
    started: Instant,
    fields: Vec<(&'static str, String)>,
}

impl ObservationScope {
    /// Open a scope and log `{name}_BEGIN`.
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let scope = Self {
            name,
            closed: false,
            started: Instant::now(),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        };
        Logger::info(&format!("{}_BEGIN", name), &scope.field_refs());
        scope
    }

    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Close the scope successfully with extra result fields.
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs();
        fields.extend(extra_fields.iter().copied());
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Close the scope as failed.
    pub fn fail(mut self, code: &str, reason: &str) {
        self.closed = true;
        let mut fields = self.field_refs();
        fields.push(("code", code));
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            let mut fields = self.field_refs();
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
