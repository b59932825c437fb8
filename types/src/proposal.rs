//! Proposal model and the time-derived lifecycle phase.
//!
//! A proposal's phase is never stored. It is recomputed from the recorded
//! timestamps and result against an externally supplied clock reading, so the
//! same snapshot always classifies the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::ids::{ObjectId, TypeTag};

/// Milliseconds on the ledger clock.
pub type Timestamp = u64;

/// Lifecycle phase of a proposal at a given instant.
///
/// Variants are declared in guard order; see [`Proposal::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Draft,
    Preparing,
    Voting,
    CoolingOff,
    FinalizationRequired,
    Failed,
    Holding,
    Executing,
    Executed,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::Draft,
        Phase::Preparing,
        Phase::Voting,
        Phase::CoolingOff,
        Phase::FinalizationRequired,
        Phase::Failed,
        Phase::Holding,
        Phase::Executing,
        Phase::Executed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Draft => "draft",
            Phase::Preparing => "preparing",
            Phase::Voting => "voting",
            Phase::CoolingOff => "coolingOff",
            Phase::FinalizationRequired => "finalizationRequired",
            Phase::Failed => "failed",
            Phase::Holding => "holding",
            Phase::Executing => "executing",
            Phase::Executed => "executed",
        }
    }

    /// No further transition can happen from this phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Phase::Failed | Phase::Executed)
    }

    /// The crank has work to do for a proposal in this phase.
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Phase::FinalizationRequired | Phase::Executing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded by finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResult {
    /// Winning option, or `None` when the proposal failed.
    pub option_index: Option<u64>,
    pub finalized_at: Timestamp,
    pub executed_at: Option<Timestamp>,
}

/// One votable alternative: an ordered list of commands plus its tally and
/// execution cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalOption {
    commands: Vec<Command>,
    label: String,
    vote_weight: u64,
    executed_command_count: u64,
}

impl ProposalOption {
    /// Returns `None` if the cursor points past the end of `commands`.
    #[must_use]
    pub fn new(
        commands: Vec<Command>,
        label: impl Into<String>,
        vote_weight: u64,
        executed_command_count: u64,
    ) -> Option<Self> {
        if executed_command_count > commands.len() as u64 {
            return None;
        }
        Some(Self {
            commands,
            label: label.into(),
            vote_weight,
            executed_command_count,
        })
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn vote_weight(&self) -> u64 {
        self.vote_weight
    }

    #[must_use]
    pub fn executed_command_count(&self) -> u64 {
        self.executed_command_count
    }

    /// The next command to execute, or `None` once every command has run.
    #[must_use]
    pub fn next_command(&self) -> Option<&Command> {
        usize::try_from(self.executed_command_count)
            .ok()
            .and_then(|i| self.commands.get(i))
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.executed_command_count == self.commands.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: ObjectId,
    pub governance_id: ObjectId,
    /// Voting token type the proposal is generic over.
    pub coin_type: TypeTag,
    pub name: String,
    pub link: String,
    pub created_at: Timestamp,
    /// `None` while the proposal is still a draft.
    pub voting_at: Option<Timestamp>,
    pub max_voting_time: u64,
    pub hold_up_time: u64,
    pub cool_off_time: u64,
    pub extra_weight_lock_time: u64,
    pub vote_threshold: u64,
    pub abstain_vote_weight: u64,
    pub deny_vote_weight: u64,
    pub total_options_vote_weight: u64,
    pub is_executing: bool,
    pub options: Vec<ProposalOption>,
    pub result: Option<ProposalResult>,
}

/// The time windows that drive a proposal's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub voting_at: Option<Timestamp>,
    pub max_voting_time: u64,
    pub cool_off_time: u64,
    pub hold_up_time: u64,
}

impl Timeline {
    /// Classify at `now` given the recorded finalization result.
    ///
    /// Guards are evaluated in [`Phase`] declaration order and the first match
    /// wins. A window whose end overflows `u64` never closes.
    #[must_use]
    pub fn phase(&self, now: Timestamp, result: Option<&ProposalResult>) -> Phase {
        let Some(voting_at) = self.voting_at else {
            return Phase::Draft;
        };
        if now < voting_at {
            return Phase::Preparing;
        }
        let voting_ends = voting_at.checked_add(self.max_voting_time);
        if before(now, voting_ends) {
            return Phase::Voting;
        }
        let cool_off_ends = voting_ends.and_then(|end| end.checked_add(self.cool_off_time));
        if before(now, cool_off_ends) {
            return Phase::CoolingOff;
        }
        let Some(result) = result else {
            return Phase::FinalizationRequired;
        };
        if result.option_index.is_none() {
            return Phase::Failed;
        }
        if before(now, result.finalized_at.checked_add(self.hold_up_time)) {
            return Phase::Holding;
        }
        if result.executed_at.is_none() {
            return Phase::Executing;
        }
        Phase::Executed
    }
}

/// `None` is a window end past `u64::MAX`.
fn before(now: Timestamp, end: Option<Timestamp>) -> bool {
    end.is_none_or(|end| now < end)
}

impl Proposal {
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        Timeline {
            voting_at: self.voting_at,
            max_voting_time: self.max_voting_time,
            cool_off_time: self.cool_off_time,
            hold_up_time: self.hold_up_time,
        }
    }

    /// Classify the proposal at `now`. See [`Timeline::phase`].
    #[must_use]
    pub fn status(&self, now: Timestamp) -> Phase {
        self.timeline().phase(now, self.result.as_ref())
    }

    /// Index of the winning option once finalized.
    ///
    /// `None` before finalization, `Some(None)` for a failed proposal.
    #[must_use]
    pub fn result_option_index(&self) -> Option<Option<u64>> {
        self.result.map(|r| r.option_index)
    }

    /// The winning option, if the proposal finalized with one.
    #[must_use]
    pub fn result_option(&self) -> Option<&ProposalOption> {
        let index = self.result?.option_index?;
        self.options.get(usize::try_from(index).ok()?)
    }

    /// Cursor over the winning option's commands.
    #[must_use]
    pub fn execution_cursor(&self) -> Option<ExecutionCursor<'_>> {
        let option_index = self.result?.option_index?;
        let option = self.options.get(usize::try_from(option_index).ok()?)?;
        Some(ExecutionCursor {
            option_index,
            option,
        })
    }

    /// Sum of every weight cast, including deny and abstain.
    #[must_use]
    pub fn total_vote_weight(&self) -> u64 {
        self.total_options_vote_weight
            .saturating_add(self.deny_vote_weight)
            .saturating_add(self.abstain_vote_weight)
    }
}

/// Read-only view of how far the winning option has been executed.
///
/// Commands before [`position`](Self::position) are already marked executed
/// on the ledger; the ledger advances the position by one per committed
/// execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionCursor<'a> {
    option_index: u64,
    option: &'a ProposalOption,
}

impl<'a> ExecutionCursor<'a> {
    #[must_use]
    pub fn option_index(&self) -> u64 {
        self.option_index
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.option.executed_command_count
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.option.commands.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.option.commands.is_empty()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.option.is_exhausted()
    }

    #[must_use]
    pub fn next_command(&self) -> Option<&'a Command> {
        self.option.next_command()
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.len() - self.position()
    }
}
