//! Core domain types for Dominion governance.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Ledger decoding lives in `dominion-core`; everything here is already typed.

#![allow(clippy::missing_errors_doc)]

mod batch;
mod command;
mod dominion;
mod governance;
mod ids;
mod proposal;

pub use batch::{Argument, BatchFull, MoveCall, MoveTarget, ObjectRef, OperationBatch};
pub use command::{Command, CommandAction, CommandHeader};
pub use dominion::{Dominion, EmptyUrlName, Entry, Registry};
pub use governance::{Governance, Member, Vote, VoteChoice};
pub use ids::{Address, ObjectId, ParseIdError, TypeTag, normalize_struct_tag};
pub use proposal::{
    ExecutionCursor, Phase, Proposal, ProposalOption, ProposalResult, Timeline, Timestamp,
};
