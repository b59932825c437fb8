use dominion_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Connection failure or timeout, after any retries.
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("object {id} not found")]
    ObjectNotFound { id: ObjectId },
    #[error("failed to decode {context}: {message}")]
    Decode { context: String, message: String },
    /// The ledger refused a batch before executing it.
    #[error("batch rejected: {message}")]
    Rejected { message: String },
}

impl LedgerError {
    /// The ledger could not be reached or refused the request, as opposed to
    /// answering that the data is missing or unreadable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LedgerError::Transport { .. } | LedgerError::Http { .. } | LedgerError::Rpc { .. }
        )
    }

    pub(crate) fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
