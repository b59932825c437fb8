//! End-to-end crank passes against the in-memory ledger.

use dominion_core::{
    ActionOutcome, BuildError, CrankError, Mode, PassReport, ProposalReader, ReadError,
    SkipReason, SubmitReport, run_pass,
};
use dominion_ledger::{LedgerSubmit, MemoryLedger};
use dominion_types::{ObjectId, Phase, TypeTag};
use serde_json::Value;

use crate::common::{
    GAS_BUDGET, OptionFixture, ProposalFixture, World, coin_commander, id, sender, sui,
};

const DOMINION: u64 = 0x5;
const GOVERNANCE: u64 = 0x4;

fn world_with_dominion() -> World {
    let mut world = World::new();
    world.add_dominion(&id(DOMINION), &id(GOVERNANCE), "treasury");
    world
}

fn outcomes(report: &PassReport, dominion: usize) -> Vec<ActionOutcome> {
    report.dominions[dominion]
        .actions
        .iter()
        .map(|a| a.outcome.clone())
        .collect()
}

async fn phase(world: &World, proposal: &ObjectId, now: u64) -> Phase {
    ProposalReader::new(&world.ledger, &world.commanders)
        .proposal(proposal)
        .await
        .unwrap()
        .status(now)
}

fn pay(world: &World, command: u64, recipient: u64, amount: u64) -> Value {
    world.transfer(&id(command), &id(DOMINION), &id(recipient), amount)
}

#[tokio::test]
async fn finalize_stamps_execution_only_for_empty_winners() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 1_000);
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x80), vec![OptionFixture::new("Nothing", 0, Vec::new())]),
    );
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x81),
            vec![OptionFixture::new("Pay", 0, vec![pay(&world, 0x100, 0xbeef, 10)])],
        ),
    );

    world.ledger.set_clock(99);
    assert_eq!(phase(&world, &id(0x80), 99).await, Phase::Voting);
    assert_eq!(world.crank().await.submission, SubmitReport::NothingToDo);

    world.ledger.set_clock(100);
    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::FinalizationRequired);
    let report = world.crank().await;
    assert_eq!(
        outcomes(&report, 0),
        [ActionOutcome::Finalize, ActionOutcome::Finalize]
    );
    assert!(matches!(report.submission, SubmitReport::Submitted { .. }));

    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::Executed);
    assert_eq!(world.result(&id(0x80))["executed_at"], "100");
    assert_eq!(phase(&world, &id(0x81), 100).await, Phase::Executing);
    assert!(world.result(&id(0x81))["executed_at"].is_null());
}

#[tokio::test]
async fn one_execution_per_dominion_per_pass() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 60);
    world.fund(&id(DOMINION), id(0xc02), 40);
    for (proposal, command, amount) in [(0x80, 0x100, 70), (0x81, 0x200, 20)] {
        world.add_proposal(
            &id(GOVERNANCE),
            &ProposalFixture::new(
                id(proposal),
                vec![OptionFixture::new("Pay", 1, vec![pay(&world, command, 0xbeef, amount)])],
            ),
        );
    }
    world.ledger.set_clock(100);
    world.crank().await;

    let report = world.crank().await;
    assert_eq!(
        outcomes(&report, 0),
        [
            ActionOutcome::Execute { command_index: 0 },
            ActionOutcome::Skip {
                phase: Phase::Executing,
                reason: SkipReason::ExecutionSlotTaken,
            },
        ]
    );
    assert!(matches!(report.submission, SubmitReport::Submitted { .. }));
    assert_eq!(world.ledger.balance(&id(0xbeef), &sui()), 70);
    assert_eq!(world.ledger.balance(&id(DOMINION), &sui()), 30);

    let report = world.crank().await;
    assert_eq!(
        outcomes(&report, 0),
        [
            ActionOutcome::Skip {
                phase: Phase::Executed,
                reason: SkipReason::NotActionable,
            },
            ActionOutcome::Execute { command_index: 0 },
        ]
    );
    assert_eq!(world.ledger.balance(&id(0xbeef), &sui()), 90);
    assert_eq!(phase(&world, &id(0x81), 100).await, Phase::Executed);
}

#[tokio::test]
async fn commands_run_in_order_one_per_pass() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 100);
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new(
                "Pay twice",
                5,
                vec![pay(&world, 0x100, 0xb0b, 30), pay(&world, 0x200, 0xca7, 20)],
            )],
        ),
    );
    world.ledger.set_clock(100);
    world.crank().await;

    let first = world.crank().await;
    assert_eq!(outcomes(&first, 0), [ActionOutcome::Execute { command_index: 0 }]);
    assert_eq!(world.executed_count(&id(0x80), 0), 1);
    assert_eq!(world.ledger.balance(&id(0xb0b), &sui()), 30);
    assert_eq!(world.ledger.balance(&id(0xca7), &sui()), 0);
    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::Executing);

    world.ledger.set_clock(150);
    let second = world.crank().await;
    assert_eq!(outcomes(&second, 0), [ActionOutcome::Execute { command_index: 1 }]);
    assert_eq!(world.ledger.balance(&id(0xca7), &sui()), 20);
    assert_eq!(world.result(&id(0x80))["executed_at"], "150");
    assert_eq!(phase(&world, &id(0x80), 150).await, Phase::Executed);
}

#[tokio::test]
async fn unknown_commander_fails_only_its_proposal() {
    let world = world_with_dominion();
    let foreign = TypeTag::new("0x99::bridge_commander::BridgeCommander");
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new(
                "Bridge",
                1,
                vec![world.foreign(&id(0x100), &id(DOMINION), &foreign)],
            )],
        ),
    );
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x81), vec![OptionFixture::new("Nothing", 1, Vec::new())]),
    );
    world.ledger.set_clock(100);

    let report = world.crank().await;
    let actions = outcomes(&report, 0);
    assert!(
        matches!(
            &actions[0],
            ActionOutcome::ReadFailed(ReadError::UnknownCommander { command, tag })
                if command == &id(0x100) && tag == &foreign
        ),
        "{actions:?}"
    );
    assert_eq!(actions[1], ActionOutcome::Finalize);
    assert!(report.has_failures());
    assert!(matches!(report.submission, SubmitReport::Submitted { .. }));
    assert!(world.result(&id(0x80)).is_null());
    assert_eq!(phase(&world, &id(0x81), 100).await, Phase::Executed);
}

#[tokio::test]
async fn settled_ledger_submits_nothing() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x80), vec![OptionFixture::new("Nothing", 0, Vec::new())]),
    );
    world.ledger.set_clock(100);
    world.crank().await;
    assert_eq!(world.ledger.submissions().len(), 1);

    for _ in 0..2 {
        let report = world.crank().await;
        assert_eq!(report.submission, SubmitReport::NothingToDo);
        assert_eq!(report.operations(), 0);
    }
    assert_eq!(world.ledger.submissions().len(), 1);
}

#[tokio::test]
async fn replayed_batch_is_rejected_by_the_ledger() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 100);
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new("Pay", 1, vec![pay(&world, 0x100, 0xbeef, 10)])],
        ),
    );
    world.ledger.set_clock(100);
    let finalize = world.crank().await.batch;
    let execute = world.crank().await.batch;

    for batch in [&finalize, &execute] {
        let outcome = world
            .ledger
            .submit(batch, &sender(), GAS_BUDGET)
            .await
            .unwrap();
        assert!(!outcome.is_success(), "{outcome:?}");
    }
    assert_eq!(world.executed_count(&id(0x80), 0), 1);
    assert_eq!(world.ledger.balance(&id(0xbeef), &sui()), 10);
}

#[tokio::test]
async fn unreadable_proposal_skips_its_dominion_only() {
    let mut world = world_with_dominion();
    world.add_dominion(&id(0x7), &id(0x9), "");
    for (governance, proposal) in [(GOVERNANCE, 0x80), (GOVERNANCE, 0x81), (0x9, 0x90)] {
        world.add_proposal(
            &id(governance),
            &ProposalFixture::new(id(proposal), vec![OptionFixture::new("Nothing", 0, Vec::new())]),
        );
    }
    world.ledger.set_clock(100);
    world.ledger.fail_reads_of(id(0x81));

    let report = world.crank().await;
    assert!(matches!(
        report.dominions[0].error,
        Some(ReadError::Ledger(_))
    ));
    assert!(report.dominions[0].actions.is_empty());
    assert_eq!(report.dominions[1].label(), id(0x7).short());
    assert_eq!(report.dominions[1].error, None);
    assert_eq!(outcomes(&report, 1), [ActionOutcome::Finalize]);
    assert!(world.result(&id(0x80)).is_null());
    assert_eq!(world.result(&id(0x90))["finalized_at"], "100");

    world.ledger.restore_reads();
    let report = world.crank().await;
    assert_eq!(
        outcomes(&report, 0),
        [ActionOutcome::Finalize, ActionOutcome::Finalize]
    );
}

#[tokio::test]
async fn missing_clock_aborts_the_pass() {
    let world = world_with_dominion();
    world.ledger.clear_clock();
    let err = run_pass(
        &world.ledger,
        &world.commanders,
        &world.settings(),
        &World::submit_mode(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CrankError::ClockUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn missing_registry_aborts_the_pass() {
    let ledger = MemoryLedger::new();
    ledger.set_clock(0);
    let world = World::new();
    let err = run_pass(
        &ledger,
        &world.commanders,
        &world.settings(),
        &World::submit_mode(),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, CrankError::RegistryUnavailable { ref registry, .. } if registry == &id(0x13)),
        "{err:?}"
    );
}

#[tokio::test]
async fn admin_command_disables_a_commander() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new(
                "Freeze payments",
                1,
                vec![world.admin(&id(0x100), &id(DOMINION), 1, &coin_commander())],
            )],
        ),
    );
    world.ledger.set_clock(100);
    world.crank().await;
    let report = world.crank().await;
    assert_eq!(outcomes(&report, 0), [ActionOutcome::Execute { command_index: 0 }]);

    let dominion = ProposalReader::new(&world.ledger, &world.commanders)
        .dominion(&id(DOMINION))
        .await
        .unwrap();
    assert!(!dominion.has_commander(&coin_commander()));
    assert_eq!(dominion.commanders.len(), 1);
}

#[tokio::test]
async fn underfunded_transfer_fails_only_its_proposal() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 10);
    for (proposal, command, amount) in [(0x80, 0x100, 50), (0x81, 0x200, 4)] {
        world.add_proposal(
            &id(GOVERNANCE),
            &ProposalFixture::new(
                id(proposal),
                vec![OptionFixture::new("Pay", 1, vec![pay(&world, command, 0xbeef, amount)])],
            ),
        );
    }
    world.ledger.set_clock(100);
    world.crank().await;

    let report = world.crank().await;
    let actions = outcomes(&report, 0);
    assert_eq!(
        actions[0],
        ActionOutcome::BuildFailed(BuildError::InsufficientBalance {
            dominion: id(DOMINION),
            coin_type: sui(),
            available: 10,
            amount: 50,
        })
    );
    assert_eq!(actions[1], ActionOutcome::Execute { command_index: 0 });
    assert!(report.has_failures());
    assert!(matches!(report.submission, SubmitReport::Submitted { .. }));

    assert_eq!(world.executed_count(&id(0x80), 0), 0);
    assert!(world.command_error(&id(0x80), 0, 0).is_null());
    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::Executing);
    assert_eq!(world.ledger.balance(&id(DOMINION), &sui()), 6);
    assert_eq!(world.ledger.balance(&id(0xbeef), &sui()), 4);
}

#[tokio::test]
async fn missing_payload_fails_only_its_proposal() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new(
                "Pay",
                1,
                vec![world.foreign(&id(0x100), &id(DOMINION), &coin_commander())],
            )],
        ),
    );
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x81), vec![OptionFixture::new("Nothing", 1, Vec::new())]),
    );
    world.list_proposal(&id(GOVERNANCE), &id(0x82));
    world.ledger.set_clock(100);

    let report = world.crank().await;
    assert_eq!(report.dominions[0].error, None);
    let actions = outcomes(&report, 0);
    assert!(
        matches!(
            &actions[0],
            ActionOutcome::ReadFailed(ReadError::Malformed { object, .. }) if object == &id(0x100)
        ),
        "{actions:?}"
    );
    assert_eq!(actions[1], ActionOutcome::Finalize);
    assert!(
        matches!(
            &actions[2],
            ActionOutcome::ReadFailed(ReadError::Malformed { object, .. }) if object == &id(0x82)
        ),
        "{actions:?}"
    );
    assert!(report.has_failures());
    assert!(matches!(report.submission, SubmitReport::Submitted { .. }));
    assert_eq!(world.result(&id(0x81))["finalized_at"], "100");
}

#[tokio::test]
async fn impossible_results_are_rejected_at_read() {
    let world = world_with_dominion();
    world.add_proposal(&id(GOVERNANCE), &ProposalFixture::new(id(0x80), Vec::new()));
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x81), vec![OptionFixture::new("Nothing", 1, Vec::new())]),
    );
    world.set_result(&id(0x81), Some(3), 100);
    world.ledger.set_clock(150);

    let report = world.crank().await;
    let actions = outcomes(&report, 0);
    assert_eq!(actions.len(), 2);
    for (action, proposal) in actions.iter().zip([0x80, 0x81]) {
        assert!(
            matches!(
                action,
                ActionOutcome::ReadFailed(ReadError::Malformed { object, .. })
                    if object == &id(proposal)
            ),
            "{actions:?}"
        );
    }
    assert!(report.has_failures());
    assert_eq!(report.submission, SubmitReport::NothingToDo);
}

#[tokio::test]
async fn executing_proposal_without_commands_is_stalled() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x80), vec![OptionFixture::new("Nothing", 1, Vec::new())]),
    );
    world.set_result(&id(0x80), Some(0), 100);
    world.ledger.set_clock(150);

    let report = world.crank().await;
    assert_eq!(
        outcomes(&report, 0),
        [ActionOutcome::Skip {
            phase: Phase::Executing,
            reason: SkipReason::OptionExhausted,
        }]
    );
    assert!(report.has_failures());
    assert_eq!(report.submission, SubmitReport::NothingToDo);
}

#[tokio::test]
async fn aborted_batch_is_reported_and_replanned() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x80), vec![OptionFixture::new("Nothing", 0, Vec::new())]),
    );
    world.ledger.set_clock(100);

    let starved = Mode::Submit {
        sender: sender(),
        gas_budget: 0,
    };
    let report = run_pass(&world.ledger, &world.commanders, &world.settings(), &starved)
        .await
        .unwrap();
    assert_eq!(outcomes(&report, 0), [ActionOutcome::Finalize]);
    assert!(report.submit_failed());
    assert!(
        matches!(&report.submission, SubmitReport::Rejected { error, .. } if error == "InsufficientGas"),
        "{:?}",
        report.submission
    );
    assert!(world.result(&id(0x80)).is_null());

    let report = world.crank().await;
    assert_eq!(outcomes(&report, 0), [ActionOutcome::Finalize]);
    assert!(!report.submit_failed());
    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::Executed);
}

#[tokio::test]
async fn failed_build_leaves_the_execution_slot_free() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x80),
            vec![OptionFixture::new("Pay", 1, vec![pay(&world, 0x100, 0xbeef, 5)])],
        ),
    );
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(
            id(0x81),
            vec![OptionFixture::new(
                "Enable",
                1,
                vec![world.admin(&id(0x200), &id(DOMINION), 0, &TypeTag::new("0x12::vault::Vault"))],
            )],
        ),
    );
    world.ledger.set_clock(100);
    world.crank().await;

    let report = world.crank().await;
    let actions = outcomes(&report, 0);
    assert!(
        matches!(&actions[0], ActionOutcome::BuildFailed(BuildError::NoCoins { .. })),
        "{actions:?}"
    );
    assert_eq!(actions[1], ActionOutcome::Execute { command_index: 0 });
    assert_eq!(report.dominions[0].executions(), 1);
    assert!(report.has_failures());
}

#[tokio::test]
async fn losing_vote_fails_the_proposal() {
    let world = world_with_dominion();
    let mut proposal =
        ProposalFixture::new(id(0x80), vec![OptionFixture::new("Yes", 3, Vec::new())]);
    proposal.deny_weight = 5;
    world.add_proposal(&id(GOVERNANCE), &proposal);
    world.ledger.set_clock(100);

    assert_eq!(outcomes(&world.crank().await, 0), [ActionOutcome::Finalize]);
    assert!(world.result(&id(0x80))["option_index"].is_null());
    assert_eq!(phase(&world, &id(0x80), 100).await, Phase::Failed);
    assert_eq!(
        outcomes(&world.crank().await, 0),
        [ActionOutcome::Skip {
            phase: Phase::Failed,
            reason: SkipReason::NotActionable,
        }]
    );
}

#[tokio::test]
async fn hold_up_delays_execution() {
    let world = world_with_dominion();
    world.fund(&id(DOMINION), id(0xc01), 100);
    let mut proposal = ProposalFixture::new(
        id(0x80),
        vec![OptionFixture::new("Pay", 1, vec![pay(&world, 0x100, 0xbeef, 10)])],
    );
    proposal.cool_off_time = 20;
    proposal.hold_up_time = 30;
    world.add_proposal(&id(GOVERNANCE), &proposal);

    world.ledger.set_clock(110);
    assert!(matches!(
        outcomes(&world.crank().await, 0)[0],
        ActionOutcome::Skip {
            phase: Phase::CoolingOff,
            ..
        }
    ));
    world.ledger.set_clock(120);
    assert_eq!(outcomes(&world.crank().await, 0), [ActionOutcome::Finalize]);
    world.ledger.set_clock(149);
    assert!(matches!(
        outcomes(&world.crank().await, 0)[0],
        ActionOutcome::Skip {
            phase: Phase::Holding,
            ..
        }
    ));
    world.ledger.set_clock(150);
    assert_eq!(
        outcomes(&world.crank().await, 0),
        [ActionOutcome::Execute { command_index: 0 }]
    );
}

#[tokio::test]
async fn dry_run_plans_without_submitting() {
    let world = world_with_dominion();
    world.add_proposal(
        &id(GOVERNANCE),
        &ProposalFixture::new(id(0x80), vec![OptionFixture::new("Nothing", 0, Vec::new())]),
    );
    world.ledger.set_clock(100);

    let report = world.plan().await;
    assert_eq!(report.submission, SubmitReport::DryRun { calls: 1 });
    assert_eq!(report.batch.len(), 1);
    assert!(world.ledger.submissions().is_empty());
    assert!(world.result(&id(0x80)).is_null());
}
