//! Backlog of tasks a person has to do by hand
//!
//! Stored as `{"next_id": n, "items": [...]}`. Older stores were a bare array
//! of items; those still load, with the counter resuming after the highest id.

use crate::error::Result;
use crate::store;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const INTERVENTION_FILE: &str = "intervention_items.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(format!(
                "Unknown priority '{}'. Valid priorities: high, medium, low",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionStatus {
    Pending,
    Completed,
}

fn default_assignee() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionItem {
    pub id: u64,
    pub category: String,
    pub action: String,
    pub priority: Priority,
    pub status: InterventionStatus,
    /// Local wall-clock time
    pub created_date: NaiveDateTime,
    /// Free text ("2025-10-01", "end of month")
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_assignee")]
    pub assigned_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Document {
    next_id: u64,
    items: Vec<InterventionItem>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            next_id: 1,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Current(Document),
    Legacy(Vec<InterventionItem>),
}

impl Default for StoredDocument {
    fn default() -> Self {
        StoredDocument::Current(Document::default())
    }
}

impl From<StoredDocument> for Document {
    fn from(stored: StoredDocument) -> Self {
        match stored {
            StoredDocument::Current(mut doc) => {
                // Never hand out an id that is already taken
                let floor = doc.items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
                doc.next_id = doc.next_id.max(floor);
                doc
            }
            StoredDocument::Legacy(items) => Document {
                next_id: items.iter().map(|i| i.id).max().unwrap_or(0) + 1,
                items,
            },
        }
    }
}

#[derive(Debug)]
pub struct InterventionQueue {
    path: PathBuf,
    doc: Document,
}

impl InterventionQueue {
    /// Open the queue stored under `dir`. A missing file is an empty queue.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(INTERVENTION_FILE);
        let stored: StoredDocument = store::load_or_default(&path)?;
        Ok(Self {
            path,
            doc: stored.into(),
        })
    }

    pub fn items(&self) -> &[InterventionItem] {
        &self.doc.items
    }

    pub fn add(
        &mut self,
        category: &str,
        action: &str,
        priority: Priority,
        due_date: Option<&str>,
        notes: &str,
    ) -> Result<InterventionItem> {
        self.add_at(
            Local::now().naive_local(),
            category,
            action,
            priority,
            due_date,
            notes,
        )
    }

    pub fn add_at(
        &mut self,
        now: NaiveDateTime,
        category: &str,
        action: &str,
        priority: Priority,
        due_date: Option<&str>,
        notes: &str,
    ) -> Result<InterventionItem> {
        let item = InterventionItem {
            id: self.doc.next_id,
            category: category.to_string(),
            action: action.to_string(),
            priority,
            status: InterventionStatus::Pending,
            created_date: now,
            due_date: due_date.map(str::to_string),
            notes: notes.to_string(),
            assigned_to: default_assignee(),
            completed_date: None,
        };
        self.doc.next_id += 1;
        self.doc.items.push(item.clone());
        self.save()?;

        tracing::info!(id = item.id, %priority, category, "intervention added");
        Ok(item)
    }

    /// Mark `id` completed. `None` when no such item exists; nothing is
    /// written in that case. Completing twice keeps the first completion date.
    pub fn complete(&mut self, id: u64) -> Result<Option<InterventionItem>> {
        self.complete_at(Local::now().naive_local(), id)
    }

    pub fn complete_at(&mut self, now: NaiveDateTime, id: u64) -> Result<Option<InterventionItem>> {
        let Some(item) = self.doc.items.iter_mut().find(|i| i.id == id) else {
            tracing::debug!(id, "no intervention with that id");
            return Ok(None);
        };
        if item.status == InterventionStatus::Completed {
            return Ok(Some(item.clone()));
        }

        item.status = InterventionStatus::Completed;
        item.completed_date = Some(now);
        let done = item.clone();
        self.save()?;

        tracing::info!(id, "intervention completed");
        Ok(Some(done))
    }

    pub fn list_pending(&self) -> Vec<&InterventionItem> {
        self.doc
            .items
            .iter()
            .filter(|i| i.status == InterventionStatus::Pending)
            .collect()
    }

    /// Items of one priority, pending or not
    pub fn list_by_priority(&self, priority: Priority) -> Vec<&InterventionItem> {
        self.doc
            .items
            .iter()
            .filter(|i| i.priority == priority)
            .collect()
    }

    fn save(&self) -> Result<()> {
        store::save(&self.path, "intervention items", &self.doc)
    }
}
