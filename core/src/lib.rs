//! Dominion governance crank.
//!
//! [`ProposalReader`] turns ledger objects into the typed model, resolving
//! each command through the [`CommanderRegistry`]. [`decide`] maps one
//! proposal to one unit of work and [`run_pass`] drives a full pass over the
//! registry, submitting a single batch.

#![allow(clippy::missing_errors_doc)]

mod admin;
mod calls;
mod coin;
mod commander;
mod crank;
mod error;
mod reader;
mod wire;

pub use admin::DominionAdminCommander;
pub use calls::{Contracts, execute_next, finalize};
pub use coin::CoinCommander;
pub use commander::{BuildFut, Commander, CommanderRegistry, DecodeFut};
pub use crank::{
    ActionOutcome, CrankSettings, Decision, DominionReport, Mode, PassReport, ProposalAction,
    SkipReason, SubmitReport, decide, run_pass,
};
pub use error::{BuildError, CrankError, DuplicateCommander, ReadError};
pub use reader::ProposalReader;
