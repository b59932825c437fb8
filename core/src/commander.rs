//! Commander capability table.
//!
//! Every command records the type tag of the commander it was created under.
//! A [`Commander`] knows how to decode that commander's payload and how to
//! build the calls that execute it. The table is fixed at startup; a tag with
//! no entry is an error, never a skip.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use dominion_ledger::LedgerRead;
use dominion_types::{Argument, Command, CommandAction, CommandHeader, MoveCall, ObjectId, TypeTag};

use crate::admin::DominionAdminCommander;
use crate::calls::Contracts;
use crate::coin::CoinCommander;
use crate::error::{BuildError, DuplicateCommander, ReadError};

pub type DecodeFut<'a> = Pin<Box<dyn Future<Output = Result<CommandAction, ReadError>> + Send + 'a>>;
pub type BuildFut<'a> = Pin<Box<dyn Future<Output = Result<Vec<MoveCall>, BuildError>> + Send + 'a>>;

pub trait Commander: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    fn commander_type(&self) -> &TypeTag;

    /// Decode the payload of a command created under this commander.
    fn decode<'a>(
        &'a self,
        ledger: &'a dyn LedgerRead,
        header: &'a CommandHeader,
    ) -> DecodeFut<'a>;

    /// Calls that consume `executor` to run `command`.
    ///
    /// The calls are placed directly after the call that produced `executor`;
    /// the last one must return the executed command.
    fn execute_calls<'a>(
        &'a self,
        ledger: &'a dyn LedgerRead,
        command: &'a Command,
        executor: Argument,
    ) -> BuildFut<'a>;
}

#[derive(Default)]
pub struct CommanderRegistry {
    commanders: HashMap<TypeTag, Box<dyn Commander>>,
}

impl CommanderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The commanders shipped with the governance framework.
    #[must_use]
    pub fn builtin(contracts: &Contracts) -> Self {
        let mut registry = Self::new();
        for commander in [
            Box::new(CoinCommander::new(&contracts.framework_commander)) as Box<dyn Commander>,
            Box::new(DominionAdminCommander::new(&contracts.dominion)),
        ] {
            registry
                .commanders
                .insert(commander.commander_type().clone(), commander);
        }
        registry
    }

    pub fn register(&mut self, commander: Box<dyn Commander>) -> Result<(), DuplicateCommander> {
        let tag = commander.commander_type().clone();
        if self.commanders.contains_key(&tag) {
            return Err(DuplicateCommander { tag });
        }
        self.commanders.insert(tag, commander);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, tag: &TypeTag) -> Option<&dyn Commander> {
        self.commanders.get(tag).map(AsRef::as_ref)
    }

    /// Commander for a command, failing with `UnknownCommander` when unregistered.
    pub fn resolve(&self, command: &ObjectId, tag: &TypeTag) -> Result<&dyn Commander, ReadError> {
        self.get(tag).ok_or_else(|| ReadError::UnknownCommander {
            command: command.clone(),
            tag: tag.clone(),
        })
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<&TypeTag> {
        let mut tags: Vec<_> = self.commanders.keys().collect();
        tags.sort();
        tags
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commanders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commanders.is_empty()
    }
}
