// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Pipeline Audit Log
// ─────────────────────────────────────────────────────────────────────
//! Per-run record of stage transitions. Owned by the orchestrator and
//! returned inside every snapshot; sequence numbers come from the
//! orchestrator's logical clock, never from wall time, so two identical
//! runs produce identical logs.

use serde::{Deserialize, Serialize};

use derivation_types::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Started,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub stage: Phase,
    pub event: AuditEvent,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        sequence: u64,
        stage: Phase,
        event: AuditEvent,
        detail: impl Into<String>,
    ) {
        self.entries.push(AuditEntry {
            sequence,
            stage,
            event,
            detail: detail.into(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    /// Entries for stages that failed or were cancelled.
    pub fn failures(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.event, AuditEvent::Failed | AuditEvent::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_failures() {
        let mut log = AuditLog::new();
        log.record(1, Phase::BaseDerivation, AuditEvent::Started, "");
        log.record(2, Phase::BaseDerivation, AuditEvent::Completed, "1 value");
        log.record(3, Phase::ParameterExpansion, AuditEvent::Started, "");
        log.record(4, Phase::ParameterExpansion, AuditEvent::Failed, "invalid level -1");
        assert_eq!(log.len(), 4);
        let failures: Vec<_> = log.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, Phase::ParameterExpansion);
        assert_eq!(log.last().unwrap().sequence, 4);
    }

    #[test]
    fn test_cancelled_counts_as_failure() {
        let mut log = AuditLog::new();
        log.record(1, Phase::RelationBuilding, AuditEvent::Cancelled, "0/5 rows");
        assert_eq!(log.failures().count(), 1);
    }
}
