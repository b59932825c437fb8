//! Error kinds, each scoped to the smallest unit that can fail.

use dominion_ledger::LedgerError;
use dominion_types::{BatchFull, ObjectId, TypeTag};
use thiserror::Error;

/// Failure to turn ledger objects into typed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("command {command} was created under unregistered commander {tag}")]
    UnknownCommander { command: ObjectId, tag: TypeTag },
    #[error("commander {tag} has no command kind {kind}")]
    UnknownCommandKind { tag: TypeTag, kind: u64 },
    #[error("malformed object {object}: {message}")]
    Malformed { object: ObjectId, message: String },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReadError {
    pub(crate) fn malformed(object: &ObjectId, message: impl Into<String>) -> Self {
        ReadError::Malformed {
            object: object.clone(),
            message: message.into(),
        }
    }

    /// A missing or undecodable payload object becomes `Malformed` on the
    /// object that refers to it; an unreachable ledger stays `Ledger`.
    pub(crate) fn payload(parent: &ObjectId, error: LedgerError) -> Self {
        if error.is_unavailable() {
            ReadError::Ledger(error)
        } else {
            ReadError::malformed(parent, error.to_string())
        }
    }

    /// The ledger itself could not be read, as opposed to returning data we
    /// cannot decode. These abort a dominion's whole contribution to a pass.
    #[must_use]
    pub fn is_ledger_failure(&self) -> bool {
        matches!(self, ReadError::Ledger(e) if e.is_unavailable())
    }
}

/// Failure to build the calls that execute a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("dominion {dominion} owns no {coin_type} coins")]
    NoCoins {
        dominion: ObjectId,
        coin_type: TypeTag,
    },
    #[error("commander {tag} cannot execute a {kind} command")]
    ActionMismatch { tag: TypeTag, kind: &'static str },
    #[error("commander {tag} is not registered")]
    UnknownCommander { tag: TypeTag },
    #[error("commander {tag} produced no calls")]
    EmptyExecution { tag: TypeTag },
    #[error("commander {tag} produced {calls} calls, more than one batch can address")]
    TooManyCalls { tag: TypeTag, calls: usize },
    #[error("proposal {proposal} has no command left to execute")]
    NothingToExecute { proposal: ObjectId },
    #[error("dominion {dominion} holds {available} {coin_type}, transfer needs {amount}")]
    InsufficientBalance {
        dominion: ObjectId,
        coin_type: TypeTag,
        available: u64,
        amount: u64,
    },
    #[error(transparent)]
    BatchFull(#[from] BatchFull),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors that abort a whole crank pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrankError {
    #[error("ledger clock unavailable: {0}")]
    ClockUnavailable(#[source] LedgerError),
    #[error("registry {registry} unavailable: {source}")]
    RegistryUnavailable {
        registry: ObjectId,
        #[source]
        source: ReadError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("commander {tag} is already registered")]
pub struct DuplicateCommander {
    pub tag: TypeTag,
}
