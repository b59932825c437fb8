//! Governance call builders.
//!
//! Each builder returns a self-contained [`OperationBatch`] whose result
//! references start at zero; the scheduler concatenates them.

use dominion_ledger::LedgerRead;
use dominion_types::{
    Argument, Governance, MoveCall, MoveTarget, ObjectId, OperationBatch, Proposal,
};
use serde::{Deserialize, Serialize};

use crate::commander::CommanderRegistry;
use crate::error::BuildError;

/// Package ids of the deployed contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contracts {
    pub governance: ObjectId,
    pub dominion: ObjectId,
    pub framework_commander: ObjectId,
}

fn clock() -> Argument {
    Argument::Object(ObjectId::clock())
}

fn proposal_call(
    contracts: &Contracts,
    proposal: &Proposal,
    function: &str,
    arguments: Vec<Argument>,
) -> MoveCall {
    MoveCall::new(
        MoveTarget::new(&contracts.governance, "proposal", function),
        vec![proposal.coin_type.clone()],
        arguments,
    )
}

/// `proposal::finalize<T>(proposal, clock)`.
#[must_use]
pub fn finalize(contracts: &Contracts, proposal: &Proposal) -> OperationBatch {
    OperationBatch::single(proposal_call(
        contracts,
        proposal,
        "finalize",
        vec![Argument::Object(proposal.id.clone()), clock()],
    ))
}

/// Execute the command at the proposal's cursor and commit it.
///
/// Call 0 issues the executor pair, the commander's calls consume the
/// executor, and the final call hands the executed command and the proposal
/// executor back to the proposal. Returns the cursor position executed.
pub async fn execute_next(
    contracts: &Contracts,
    ledger: &dyn LedgerRead,
    commanders: &CommanderRegistry,
    governance: &Governance,
    proposal: &Proposal,
) -> Result<(u64, OperationBatch), BuildError> {
    let nothing = || BuildError::NothingToExecute {
        proposal: proposal.id.clone(),
    };
    let cursor = proposal.execution_cursor().ok_or_else(nothing)?;
    let command = cursor.next_command().ok_or_else(nothing)?;
    let tag = &command.header.commander;
    let commander = commanders
        .get(tag)
        .ok_or_else(|| BuildError::UnknownCommander { tag: tag.clone() })?;

    let start = proposal_call(
        contracts,
        proposal,
        "execute_next_command",
        vec![
            Argument::Object(proposal.id.clone()),
            Argument::Object(governance.id.clone()),
            Argument::Object(governance.dominion_id.clone()),
            clock(),
        ],
    );
    let executed = commander
        .execute_calls(ledger, command, Argument::NestedResult(0, 0))
        .await?;
    if executed.is_empty() {
        return Err(BuildError::EmptyExecution { tag: tag.clone() });
    }
    let returned = u16::try_from(executed.len()).map_err(|_| BuildError::TooManyCalls {
        tag: tag.clone(),
        calls: executed.len(),
    })?;
    let commit = proposal_call(
        contracts,
        proposal,
        "commit_command_execution",
        vec![
            Argument::Object(proposal.id.clone()),
            Argument::Result(returned),
            Argument::NestedResult(0, 1),
            clock(),
        ],
    );

    let mut calls = Vec::with_capacity(executed.len() + 2);
    calls.push(start);
    calls.extend(executed);
    calls.push(commit);
    Ok((cursor.position(), OperationBatch::from_calls(calls)))
}
