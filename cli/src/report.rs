//! Operator-facing text for pass reports and proposal listings.

use std::fmt::Write;

use dominion_core::{ActionOutcome, PassReport, SkipReason, SubmitReport};
use dominion_types::{Member, Phase, Proposal, Timestamp, VoteChoice};

pub const EXIT_OK: u8 = 0;
pub const EXIT_PARTIAL: u8 = 1;
pub const EXIT_SUBMIT_FAILED: u8 = 2;
pub const EXIT_FATAL: u8 = 3;

/// One line per proposal action, then the submission result.
#[must_use]
pub fn render_pass(report: &PassReport) -> String {
    let mut out = String::new();
    for dominion in &report.dominions {
        let label = dominion.label();
        if let Some(error) = &dominion.error {
            let _ = writeln!(out, "{label}: error {error}");
            continue;
        }
        for action in &dominion.actions {
            let proposal = &action.proposal;
            let _ = match &action.outcome {
                ActionOutcome::Finalize => writeln!(out, "{label}: finalize {proposal}"),
                ActionOutcome::Execute { command_index } => {
                    writeln!(out, "{label}: execute #{command_index} {proposal}")
                }
                ActionOutcome::Skip {
                    phase,
                    reason: SkipReason::NotActionable,
                } => writeln!(out, "{label}: skip {proposal} ({phase})"),
                ActionOutcome::Skip { phase, reason } if reason.is_stalled() => {
                    writeln!(out, "{label}: error {proposal}: {phase}, {reason}")
                }
                ActionOutcome::Skip { phase, reason } => {
                    writeln!(out, "{label}: skip {proposal} ({phase}, {reason})")
                }
                ActionOutcome::ReadFailed(error) => {
                    writeln!(out, "{label}: error {proposal}: {error}")
                }
                ActionOutcome::BuildFailed(error) => {
                    writeln!(out, "{label}: error {proposal}: {error}")
                }
            };
        }
    }

    let _ = match &report.submission {
        SubmitReport::NothingToDo => writeln!(out, "nothing to do"),
        SubmitReport::DryRun { calls } => {
            writeln!(out, "dry run: {calls} calls planned, nothing submitted")
        }
        SubmitReport::Submitted { digest } => writeln!(out, "submitted {digest}"),
        SubmitReport::Rejected { digest, error } => writeln!(out, "rejected {digest}: {error}"),
        SubmitReport::Failed { error } => writeln!(out, "submit failed: {error}"),
    };
    out
}

#[must_use]
pub fn pass_exit_code(report: &PassReport) -> u8 {
    if report.submit_failed() {
        EXIT_SUBMIT_FAILED
    } else if report.has_failures() {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

/// `<id> "<name>": <phase>` with the winning option and cursor once finalized.
#[must_use]
pub fn describe_proposal(proposal: &Proposal, now: Timestamp) -> String {
    let phase = proposal.status(now);
    let mut line = format!("{} {:?}: {phase}", proposal.id, proposal.name);
    match (phase, proposal.result_option(), proposal.execution_cursor()) {
        (Phase::Holding | Phase::Executing | Phase::Executed, Some(option), Some(cursor)) => {
            let _ = write!(
                line,
                " [{}] {}/{} commands",
                option.label(),
                cursor.position(),
                cursor.len()
            );
            let failed = option.commands().iter().filter(|c| c.failed()).count();
            if failed > 0 {
                let _ = write!(line, ", {failed} failed");
            }
        }
        (Phase::Voting | Phase::CoolingOff | Phase::FinalizationRequired, _, _) => {
            let _ = write!(
                line,
                " weight {} of threshold {}",
                proposal.total_vote_weight(),
                proposal.vote_threshold
            );
        }
        _ => {}
    }
    line
}

#[must_use]
pub fn describe_member(member: &Member) -> String {
    let mut out = format!(
        "member {} of governance {}\nbalance {}, committed {}\n",
        member.id,
        member.governance_id,
        member.balance,
        member.committed_weight()
    );
    for vote in &member.votes {
        let choice = match vote.choice() {
            VoteChoice::Option(index) => format!("option {index}"),
            VoteChoice::Abstain => "abstain".to_string(),
            VoteChoice::Against => "against".to_string(),
        };
        let _ = writeln!(out, "  {} {choice} weight {}", vote.proposal_id, vote.weight);
    }
    out
}
