//! Client records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Database, Record};
use crate::fields::ClientStatus;

/// A customer of the studio. Projects point at clients via `client_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub company: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub status: ClientStatus,
    #[serde(default)]
    pub observations: String,
    pub created_at: DateTime<Utc>,
}

/// A client that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub status: ClientStatus,
    pub observations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<ClientStatus>,
    pub observations: Option<String>,
}

impl Client {
    /// Case-insensitive search over name and company.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.company.to_lowercase().contains(&needle)
    }
}

impl Record for Client {
    type Draft = ClientDraft;
    type Patch = ClientPatch;
    const KIND: &'static str = "client";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn from_draft(id: String, draft: ClientDraft, now: DateTime<Utc>) -> Self {
        Client {
            id,
            name: draft.name,
            company: draft.company,
            email: draft.email,
            phone: draft.phone,
            status: draft.status,
            observations: draft.observations,
            created_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ClientPatch, _now: DateTime<Utc>) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.company {
            self.company = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.phone {
            self.phone = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.observations {
            self.observations = v;
        }
    }

    fn table(db: &Database) -> &Vec<Self> {
        &db.clients
    }

    fn table_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.clients
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}
