use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surety_types::Identity;
use thiserror::Error;
use uuid::Uuid;

/// Kinds of committed mutation recorded in the journal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    Genesis,
    Application,
    Vote,
    Funding,
    Purchase,
    StatusRequest,
    Resolution,
    Withdrawal,
    Governance,
}

/// Hash-chained journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub entry_id: String,
    pub index: u64,
    pub kind: JournalKind,
    pub actor: Identity,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("journal integrity error: {0}")]
    Integrity(String),
}

/// Append-only audit journal.
///
/// Entries are never edited; each one commits to its predecessor's hash so a
/// persisted journal can be verified on reload.
#[derive(Debug, Default, Clone)]
pub struct AuditJournal {
    entries: Vec<JournalEntry>,
}

impl AuditJournal {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a journal from persisted entries and verify the hash chain.
    pub fn from_entries(entries: Vec<JournalEntry>) -> Result<Self, JournalError> {
        let journal = Self { entries };

        for (expected_index, entry) in journal.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(JournalError::Integrity(format!(
                    "journal index gap at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !journal.verify_chain() {
            return Err(JournalError::Integrity(
                "persisted journal hash-chain verification failed".to_string(),
            ));
        }

        Ok(journal)
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }

    pub fn append(
        &mut self,
        kind: JournalKind,
        actor: &Identity,
        subject: impl Into<String>,
        payload: Value,
    ) -> Result<&JournalEntry, JournalError> {
        let index = self.entries.len() as u64;
        let timestamp = Utc::now();
        let subject = subject.into();
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(
            index,
            &kind,
            actor,
            &subject,
            timestamp,
            &payload,
            previous_hash.as_deref(),
        )?;

        self.entries.push(JournalEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            kind,
            actor: actor.clone(),
            subject,
            timestamp,
            payload,
            previous_hash,
            entry_hash,
        });
        self.entries
            .last()
            .ok_or_else(|| JournalError::Integrity("append lost entry".to_string()))
    }

    /// Drop entries appended after `len`. Used to undo an append whose
    /// commit did not complete; earlier entries are never touched.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected = compute_entry_hash(
                entry.index,
                &entry.kind,
                &entry.actor,
                &entry.subject,
                entry.timestamp,
                &entry.payload,
                previous_hash.as_deref(),
            );
            match expected {
                Ok(hash) if hash == entry.entry_hash => {}
                _ => return false,
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }
}

fn compute_entry_hash(
    index: u64,
    kind: &JournalKind,
    actor: &Identity,
    subject: &str,
    timestamp: DateTime<Utc>,
    payload: &Value,
    previous_hash: Option<&str>,
) -> Result<String, JournalError> {
    let material = serde_json::json!({
        "index": index,
        "kind": kind,
        "actor": actor,
        "subject": subject,
        "timestamp": timestamp,
        "payload": payload,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
