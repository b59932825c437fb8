//! Crank scheduler.
//!
//! One pass reads the clock, walks every registered dominion, decides one
//! unit of work per proposal and submits everything decided as a single
//! batch. At most one command executes per dominion per pass; finalizations
//! only touch their own proposal and are not limited.

use std::fmt;

use dominion_ledger::{LedgerError, LedgerRead, LedgerSubmit};
use dominion_types::{
    Address, Dominion, Governance, ObjectId, OperationBatch, Phase, Proposal, Timestamp,
};

use crate::calls::{self, Contracts};
use crate::commander::CommanderRegistry;
use crate::error::{BuildError, CrankError, ReadError};
use crate::reader::ProposalReader;

// ── Decisions ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The phase needs no crank action.
    NotActionable,
    /// Another proposal of the same dominion already executes this pass.
    ExecutionSlotTaken,
    /// Executing, but the winning option has no command left. The proposal
    /// cannot progress, so this counts as a failure.
    OptionExhausted,
}

impl SkipReason {
    #[must_use]
    pub fn is_stalled(self) -> bool {
        matches!(self, SkipReason::OptionExhausted)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotActionable => "no action",
            SkipReason::ExecutionSlotTaken => "dominion already executing this pass",
            SkipReason::OptionExhausted => "stalled with no command left",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Finalize,
    ExecuteNext { command_index: u64 },
    Skip { phase: Phase, reason: SkipReason },
}

/// What to do with `proposal` at `now`.
///
/// `execution_slot_free` is false once another proposal of the same dominion
/// has been scheduled to execute in this pass.
#[must_use]
pub fn decide(proposal: &Proposal, now: Timestamp, execution_slot_free: bool) -> Decision {
    let phase = proposal.status(now);
    match phase {
        Phase::FinalizationRequired => Decision::Finalize,
        Phase::Executing => match proposal.execution_cursor() {
            Some(cursor) if !cursor.is_exhausted() => {
                if execution_slot_free {
                    Decision::ExecuteNext {
                        command_index: cursor.position(),
                    }
                } else {
                    Decision::Skip {
                        phase,
                        reason: SkipReason::ExecutionSlotTaken,
                    }
                }
            }
            _ => Decision::Skip {
                phase,
                reason: SkipReason::OptionExhausted,
            },
        },
        phase => Decision::Skip {
            phase,
            reason: SkipReason::NotActionable,
        },
    }
}

// ── Reports ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Finalize,
    Execute { command_index: u64 },
    Skip { phase: Phase, reason: SkipReason },
    ReadFailed(ReadError),
    BuildFailed(BuildError),
}

impl ActionOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            ActionOutcome::ReadFailed(_) | ActionOutcome::BuildFailed(_) => true,
            ActionOutcome::Skip { reason, .. } => reason.is_stalled(),
            ActionOutcome::Finalize | ActionOutcome::Execute { .. } => false,
        }
    }

    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(self, ActionOutcome::Finalize | ActionOutcome::Execute { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalAction {
    pub proposal: ObjectId,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominionReport {
    pub dominion: ObjectId,
    pub url_name: Option<String>,
    pub actions: Vec<ProposalAction>,
    /// Set when the dominion was skipped entirely.
    pub error: Option<ReadError>,
}

impl DominionReport {
    fn new(dominion: &ObjectId, url_name: Option<&str>) -> Self {
        Self {
            dominion: dominion.clone(),
            url_name: url_name.map(str::to_string),
            actions: Vec::new(),
            error: None,
        }
    }

    /// `url_name` if registered, else the abbreviated id.
    #[must_use]
    pub fn label(&self) -> String {
        self.url_name
            .clone()
            .unwrap_or_else(|| self.dominion.short())
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.actions.iter().any(|a| a.outcome.is_failure())
    }

    #[must_use]
    pub fn executions(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.outcome, ActionOutcome::Execute { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReport {
    NothingToDo,
    /// Planned but not submitted.
    DryRun { calls: usize },
    Submitted { digest: String },
    /// Accepted by the ledger but execution failed; nothing was applied.
    Rejected { digest: String, error: String },
    Failed { error: LedgerError },
}

impl SubmitReport {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, SubmitReport::Rejected { .. } | SubmitReport::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub now: Timestamp,
    pub dominions: Vec<DominionReport>,
    pub batch: OperationBatch,
    pub submission: SubmitReport,
}

impl PassReport {
    /// A dominion or proposal could not be read or built.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.dominions.iter().any(DominionReport::has_failures)
    }

    #[must_use]
    pub fn submit_failed(&self) -> bool {
        self.submission.is_failure()
    }

    /// Number of finalize and execute operations enqueued.
    #[must_use]
    pub fn operations(&self) -> usize {
        self.dominions
            .iter()
            .flat_map(|d| &d.actions)
            .filter(|a| a.outcome.is_mutating())
            .count()
    }
}

// ── Pass ──

#[derive(Debug, Clone)]
pub struct CrankSettings {
    pub registry: ObjectId,
    pub contracts: Contracts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Plan only.
    DryRun,
    Submit { sender: Address, gas_budget: u64 },
}

/// Run one crank pass.
///
/// Only a missing clock or registry aborts the pass. Read and build failures
/// are recorded in the report against the dominion or proposal they hit, and
/// a rejected submission is reported, never retried.
pub async fn run_pass<L>(
    ledger: &L,
    commanders: &CommanderRegistry,
    settings: &CrankSettings,
    mode: &Mode,
) -> Result<PassReport, CrankError>
where
    L: LedgerRead + LedgerSubmit,
{
    let reader = ProposalReader::new(ledger, commanders);
    let now = reader.clock().await.map_err(CrankError::ClockUnavailable)?;
    let registry = reader
        .registry(&settings.registry)
        .await
        .map_err(|source| CrankError::RegistryUnavailable {
            registry: settings.registry.clone(),
            source,
        })?;
    tracing::info!(now, dominions = registry.entries.len(), "Crank pass started");

    let ids: Vec<ObjectId> = registry.dominion_ids().cloned().collect();
    let dominions = match reader.dominions(&ids).await {
        Ok(dominions) => dominions,
        Err(e) => ids.iter().map(|_| Err(ReadError::Ledger(e.clone()))).collect(),
    };

    let mut reports = Vec::with_capacity(ids.len());
    let mut batch = OperationBatch::new();
    for (id, dominion) in ids.iter().zip(dominions) {
        let mut report = DominionReport::new(id, registry.find_url_name(id));
        let planned = match dominion {
            Ok(dominion) => {
                plan_dominion(&reader, ledger, commanders, settings, &dominion, now).await
            }
            Err(e) => Err(e),
        };
        match planned {
            Ok((mut actions, planned)) => {
                if let Err(full) = batch.append(planned) {
                    tracing::warn!(
                        dominion = %id.short(),
                        %full,
                        "Deferring dominion to the next pass"
                    );
                    for action in actions.iter_mut().filter(|a| a.outcome.is_mutating()) {
                        action.outcome = ActionOutcome::BuildFailed(full.into());
                    }
                }
                report.actions = actions;
            }
            Err(error) => {
                tracing::warn!(dominion = %id.short(), %error, "Skipping dominion this pass");
                report.error = Some(error);
            }
        }
        reports.push(report);
    }

    let submission = submit(ledger, &batch, mode).await;
    Ok(PassReport {
        now,
        dominions: reports,
        batch,
        submission,
    })
}

/// Decide and build the work for one dominion.
///
/// Fails as a whole if the ledger cannot be read; proposals that decode badly
/// or cannot be built are reported individually.
async fn plan_dominion(
    reader: &ProposalReader<'_>,
    ledger: &dyn LedgerRead,
    commanders: &CommanderRegistry,
    settings: &CrankSettings,
    dominion: &Dominion,
    now: Timestamp,
) -> Result<(Vec<ProposalAction>, OperationBatch), ReadError> {
    let governance = reader.governance(dominion.governance_id()).await?;
    check_governs(&governance, dominion)?;
    let proposals = reader.proposals(&governance.proposal_ids).await?;

    let mut actions = Vec::with_capacity(proposals.len());
    let mut batch = OperationBatch::new();
    let mut slot_free = true;
    for (id, proposal) in governance.proposal_ids.iter().zip(proposals) {
        let proposal = match proposal {
            Err(e) if e.is_ledger_failure() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    dominion = %dominion.id.short(),
                    proposal = %id.short(),
                    error = %e,
                    "Failed to decode proposal"
                );
                actions.push(ProposalAction {
                    proposal: id.clone(),
                    outcome: ActionOutcome::ReadFailed(e),
                });
                continue;
            }
            Ok(p) if p.governance_id != governance.id => {
                actions.push(ProposalAction {
                    proposal: id.clone(),
                    outcome: ActionOutcome::ReadFailed(ReadError::malformed(
                        id,
                        format!("belongs to governance {}", p.governance_id),
                    )),
                });
                continue;
            }
            Ok(p) => p,
        };

        let outcome = match decide(&proposal, now, slot_free) {
            Decision::Finalize => match batch
                .append(calls::finalize(&settings.contracts, &proposal))
            {
                Ok(()) => {
                    tracing::info!(
                        dominion = %dominion.id.short(),
                        proposal = %id.short(),
                        "finalize"
                    );
                    ActionOutcome::Finalize
                }
                Err(full) => {
                    tracing::warn!(
                        dominion = %dominion.id.short(),
                        proposal = %id.short(),
                        %full,
                        "Failed to enqueue finalize"
                    );
                    ActionOutcome::BuildFailed(full.into())
                }
            },
            Decision::ExecuteNext { command_index } => {
                let built = calls::execute_next(
                    &settings.contracts,
                    ledger,
                    commanders,
                    &governance,
                    &proposal,
                )
                .await
                .and_then(|(_, execute)| batch.append(execute).map_err(BuildError::from));
                match built {
                    Ok(()) => {
                        tracing::info!(
                            dominion = %dominion.id.short(),
                            proposal = %id.short(),
                            command_index,
                            "execute"
                        );
                        slot_free = false;
                        ActionOutcome::Execute { command_index }
                    }
                    Err(BuildError::Ledger(e)) if e.is_unavailable() => {
                        return Err(ReadError::Ledger(e));
                    }
                    Err(e) => {
                        tracing::warn!(
                            dominion = %dominion.id.short(),
                            proposal = %id.short(),
                            command_index,
                            error = %e,
                            "Failed to build execution"
                        );
                        ActionOutcome::BuildFailed(e)
                    }
                }
            }
            Decision::Skip { phase, reason } if reason.is_stalled() => {
                tracing::warn!(
                    dominion = %dominion.id.short(),
                    proposal = %id.short(),
                    %phase,
                    "Executing proposal has no command left"
                );
                ActionOutcome::Skip { phase, reason }
            }
            Decision::Skip { phase, reason } => {
                tracing::debug!(
                    dominion = %dominion.id.short(),
                    proposal = %id.short(),
                    %phase,
                    %reason,
                    "skip"
                );
                ActionOutcome::Skip { phase, reason }
            }
        };
        actions.push(ProposalAction {
            proposal: id.clone(),
            outcome,
        });
    }
    Ok((actions, batch))
}

fn check_governs(governance: &Governance, dominion: &Dominion) -> Result<(), ReadError> {
    if governance.dominion_id == dominion.id {
        Ok(())
    } else {
        Err(ReadError::malformed(
            &governance.id,
            format!(
                "governs dominion {} but is the owner of {}",
                governance.dominion_id, dominion.id
            ),
        ))
    }
}

async fn submit<L: LedgerSubmit>(ledger: &L, batch: &OperationBatch, mode: &Mode) -> SubmitReport {
    if batch.is_empty() {
        tracing::info!("Nothing to do");
        return SubmitReport::NothingToDo;
    }
    let (sender, gas_budget) = match mode {
        Mode::DryRun => return SubmitReport::DryRun { calls: batch.len() },
        Mode::Submit { sender, gas_budget } => (sender, *gas_budget),
    };

    match ledger.submit(batch, sender, gas_budget).await {
        Ok(outcome) if outcome.is_success() => {
            tracing::info!(digest = %outcome.digest, calls = batch.len(), "Batch executed");
            SubmitReport::Submitted {
                digest: outcome.digest,
            }
        }
        Ok(outcome) => {
            let error = outcome.error().unwrap_or("unknown failure").to_string();
            tracing::error!(digest = %outcome.digest, %error, "Batch failed on the ledger");
            SubmitReport::Rejected {
                digest: outcome.digest,
                error,
            }
        }
        Err(error) => {
            tracing::error!(%error, "Batch submission failed");
            SubmitReport::Failed { error }
        }
    }
}
