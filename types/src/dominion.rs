//! Dominions and the url-name registry.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::ids::{Address, ObjectId, TypeTag};

/// A governed ledger account and the commanders enabled on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dominion {
    pub id: ObjectId,
    pub admin_address: Address,
    /// Owner of the dominion. For governed dominions this is the governance id.
    pub owner_address: Address,
    pub commanders: BTreeSet<TypeTag>,
}

impl Dominion {
    #[must_use]
    pub fn governance_id(&self) -> &ObjectId {
        &self.owner_address
    }

    #[must_use]
    pub fn has_commander(&self, commander: &TypeTag) -> bool {
        self.commanders.contains(commander)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dominion_id: ObjectId,
    /// Human-readable alias; the ledger stores an empty string for none.
    pub url_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("url name can not be empty")]
pub struct EmptyUrlName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub id: ObjectId,
    pub owner_cap_id: Option<ObjectId>,
    pub policy_address: Option<Address>,
    pub entries: Vec<Entry>,
}

impl Registry {
    #[must_use]
    pub fn find_url_name(&self, dominion_id: &ObjectId) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| &e.dominion_id == dominion_id)
            .and_then(|e| e.url_name.as_deref())
    }

    pub fn find_dominion_id(&self, url_name: &str) -> Result<Option<&ObjectId>, EmptyUrlName> {
        if url_name.trim().is_empty() {
            return Err(EmptyUrlName);
        }
        Ok(self
            .entries
            .iter()
            .find(|e| e.url_name.as_deref() == Some(url_name))
            .map(|e| &e.dominion_id))
    }

    pub fn dominion_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.iter().map(|e| &e.dominion_id)
    }
}
