//! Shared fixtures: a populated in-memory ledger and a crank wired to it.
//!
//! Objects are written in the same JSON layout the node returns, so the
//! readers under test decode them exactly as they would live data.

#![allow(dead_code)]

use dominion_core::{CommanderRegistry, Contracts, CrankSettings, Mode, PassReport, run_pass};
use dominion_ledger::{DynamicFieldName, MemoryLedger};
use dominion_types::{Address, ObjectId, Timestamp, TypeTag};
use serde_json::{Value, json};

pub const GAS_BUDGET: u64 = 50_000_000;

const TYPE_NAME: &str = "0x1::type_name::TypeName";

pub fn id(n: u64) -> ObjectId {
    ObjectId::parse(&format!("{n:x}")).unwrap()
}

pub fn sui() -> TypeTag {
    TypeTag::new("0x2::sui::SUI")
}

pub fn contracts() -> Contracts {
    Contracts {
        governance: id(0x10),
        dominion: id(0x11),
        framework_commander: id(0x12),
    }
}

pub fn registry_id() -> ObjectId {
    id(0x13)
}

pub fn sender() -> Address {
    id(0xa11ce)
}

pub fn coin_commander() -> TypeTag {
    TypeTag::from_parts(&contracts().framework_commander, "coin_commander", "CoinCommander")
}

pub fn admin_commander() -> TypeTag {
    TypeTag::from_parts(&contracts().dominion, "dominion_admin_commander", "DominionAdminCommander")
}

/// `TypeName` values carry no `0x` prefix.
fn type_name(tag: &TypeTag) -> Value {
    json!({
        "type": TYPE_NAME,
        "fields": { "name": tag.as_str().trim_start_matches("0x") }
    })
}

fn governance_type() -> TypeTag {
    TypeTag::new(&format!("{}::governance::Governance<{}>", contracts().governance, sui()))
}

fn proposal_type() -> TypeTag {
    TypeTag::new(&format!("{}::proposal::Proposal<{}>", contracts().governance, sui()))
}

/// One ranked option of a proposal fixture.
pub struct OptionFixture {
    pub label: &'static str,
    pub weight: u64,
    pub commands: Vec<Value>,
}

impl OptionFixture {
    pub fn new(label: &'static str, weight: u64, commands: Vec<Value>) -> Self {
        Self {
            label,
            weight,
            commands,
        }
    }
}

/// A proposal whose vote opens at t=0 and closes at `max_voting_time`.
pub struct ProposalFixture {
    pub id: ObjectId,
    pub name: &'static str,
    pub voting_at: Option<Timestamp>,
    pub max_voting_time: u64,
    pub cool_off_time: u64,
    pub hold_up_time: u64,
    pub vote_threshold: u64,
    pub deny_weight: u64,
    pub abstain_weight: u64,
    pub options: Vec<OptionFixture>,
}

impl ProposalFixture {
    pub fn new(id: ObjectId, options: Vec<OptionFixture>) -> Self {
        Self {
            id,
            name: "proposal",
            voting_at: Some(0),
            max_voting_time: 100,
            cool_off_time: 0,
            hold_up_time: 0,
            vote_threshold: 0,
            deny_weight: 0,
            abstain_weight: 0,
            options,
        }
    }

    fn to_fields(&self, governance: &ObjectId) -> Value {
        let options: Vec<Value> = self
            .options
            .iter()
            .map(|o| {
                json!({
                    "type": format!("{}::proposal::ProposalOption", contracts().governance),
                    "fields": {
                        "commands": o.commands,
                        "label": o.label,
                        "vote_weight": o.weight.to_string(),
                        "executed_command_count": "0",
                    }
                })
            })
            .collect();
        let options_weight: u64 = self.options.iter().map(|o| o.weight).sum();
        json!({
            "id": { "id": self.id },
            "governance_id": governance,
            "name": self.name,
            "link": "",
            "created_at": "0",
            "voting_at": self.voting_at.map(|t| t.to_string()),
            "max_voting_time": self.max_voting_time.to_string(),
            "hold_up_time": self.hold_up_time.to_string(),
            "cool_off_time": self.cool_off_time.to_string(),
            "extra_weight_lock_time": "0",
            "vote_threshold": self.vote_threshold.to_string(),
            "abstain_vote_weight": self.abstain_weight.to_string(),
            "deny_vote_weight": self.deny_weight.to_string(),
            "total_options_vote_weight": options_weight.to_string(),
            "is_executing": false,
            "options": options,
            "result": null,
        })
    }
}

/// An in-memory ledger with the contracts, registry and clock in place.
pub struct World {
    pub ledger: MemoryLedger,
    pub commanders: CommanderRegistry,
    entries: Vec<Value>,
}

impl World {
    pub fn new() -> Self {
        let world = Self {
            ledger: MemoryLedger::new(),
            commanders: CommanderRegistry::builtin(&contracts()),
            entries: Vec::new(),
        };
        world.ledger.set_clock(0);
        world.write_registry();
        world
    }

    pub fn settings(&self) -> CrankSettings {
        CrankSettings {
            registry: registry_id(),
            contracts: contracts(),
        }
    }

    pub fn submit_mode() -> Mode {
        Mode::Submit {
            sender: sender(),
            gas_budget: GAS_BUDGET,
        }
    }

    pub async fn crank(&self) -> PassReport {
        run_pass(&self.ledger, &self.commanders, &self.settings(), &Self::submit_mode())
            .await
            .unwrap()
    }

    pub async fn plan(&self) -> PassReport {
        run_pass(&self.ledger, &self.commanders, &self.settings(), &Mode::DryRun)
            .await
            .unwrap()
    }

    fn write_registry(&self) {
        self.ledger.insert_object(
            registry_id(),
            TypeTag::from_parts(&contracts().dominion, "dominion_registry", "DominionRegistry"),
            json!({
                "id": { "id": registry_id() },
                "owner_cap_id": null,
                "policy_address": null,
                "entries": self.entries,
            }),
        );
    }

    /// Register a governed dominion with the coin and admin commanders enabled.
    pub fn add_dominion(&mut self, dominion: &ObjectId, governance: &ObjectId, url_name: &str) {
        self.ledger.insert_object(
            dominion.clone(),
            TypeTag::from_parts(&contracts().dominion, "dominion", "Dominion"),
            json!({
                "id": { "id": dominion },
                "admin_address": governance,
                "owner_address": governance,
                "commanders": {
                    "type": format!("0x2::vec_set::VecSet<{TYPE_NAME}>"),
                    "fields": { "contents": [type_name(&coin_commander()), type_name(&admin_commander())] }
                },
            }),
        );
        self.ledger.insert_object(
            governance.clone(),
            governance_type(),
            json!({
                "id": { "id": governance },
                "name": "Council",
                "link": "",
                "admin_cap_id": null,
                "veto_cap_id": null,
                "dominion_owner_cap": {
                    "type": format!("{}::dominion::DominionOwnerCap", contracts().dominion),
                    "fields": { "dominion_id": dominion }
                },
                "min_weight_to_create_proposal": "1",
                "vote_threshold": "0",
                "max_voting_time": "100",
                "hold_up_time": "0",
                "cool_off_time": "0",
                "extra_weight_lock_time": "0",
                "proposal_ids": [],
            }),
        );
        self.entries.push(json!({
            "type": format!("{}::dominion_registry::Entry", contracts().dominion),
            "fields": { "dominion_id": dominion, "url_name": url_name }
        }));
        self.write_registry();
    }

    /// Store the proposal and append it to the governance's proposal list.
    pub fn add_proposal(&self, governance: &ObjectId, proposal: &ProposalFixture) {
        self.ledger.insert_object(
            proposal.id.clone(),
            proposal_type(),
            proposal.to_fields(governance),
        );
        self.list_proposal(governance, &proposal.id);
    }

    /// Append `proposal` to the governance's list without storing it.
    pub fn list_proposal(&self, governance: &ObjectId, proposal: &ObjectId) {
        let mut fields = self.ledger.fields(governance).unwrap();
        fields["proposal_ids"]
            .as_array_mut()
            .unwrap()
            .push(json!(proposal));
        self.ledger
            .insert_object(governance.clone(), governance_type(), fields);
    }

    /// Overwrite a stored proposal's finalization result.
    pub fn set_result(&self, proposal: &ObjectId, option_index: Option<u64>, finalized_at: Timestamp) {
        let mut fields = self.ledger.fields(proposal).unwrap();
        fields["result"] = json!({
            "type": format!("{}::proposal::ProposalResult", contracts().governance),
            "fields": {
                "option_index": option_index.map(|i| i.to_string()),
                "finalized_at": finalized_at.to_string(),
                "executed_at": null,
            }
        });
        self.ledger
            .insert_object(proposal.clone(), proposal_type(), fields);
    }

    pub fn fund(&self, dominion: &ObjectId, coin: ObjectId, balance: u64) {
        self.ledger.insert_coin(dominion, &sui(), coin, balance);
    }

    fn command(&self, command: &ObjectId, dominion: &ObjectId, commander: &TypeTag) -> Value {
        json!({
            "type": format!("{}::command::Command", contracts().dominion),
            "fields": {
                "id": { "id": command },
                "commander": type_name(commander),
                "dominion_id": dominion,
                "execution_error": null,
                "is_executed": false,
            }
        })
    }

    /// A coin transfer command; payload ids are derived from `command`'s.
    pub fn transfer(
        &self,
        command: &ObjectId,
        dominion: &ObjectId,
        recipient: &Address,
        amount: u64,
    ) -> Value {
        let payload = self.payload_id(command, 1);
        self.ledger.insert_dynamic_field(
            command,
            &DynamicFieldName::u8(1),
            payload.clone(),
            TypeTag::new(&format!(
                "{}::coin_commander::CoinCommand<{}>",
                contracts().framework_commander,
                sui()
            )),
            json!({ "id": { "id": payload }, "kind": "0" }),
        );
        self.ledger.insert_dynamic_field(
            &payload,
            &DynamicFieldName::u8(0),
            self.payload_id(command, 2),
            TypeTag::new("0x2::dynamic_field::Field<u8, address>"),
            json!({ "value": recipient }),
        );
        self.ledger.insert_dynamic_field(
            &payload,
            &DynamicFieldName::u8(1),
            self.payload_id(command, 3),
            TypeTag::new("0x2::dynamic_field::Field<u8, u64>"),
            json!({ "value": amount.to_string() }),
        );
        self.command(command, dominion, &coin_commander())
    }

    /// Enable (`kind` 0) or disable (`kind` 1) `target` on the dominion.
    pub fn admin(&self, command: &ObjectId, dominion: &ObjectId, kind: u64, target: &TypeTag) -> Value {
        let payload = self.payload_id(command, 1);
        self.ledger.insert_dynamic_field(
            command,
            &DynamicFieldName::u8(1),
            payload.clone(),
            TypeTag::new(&format!(
                "{}::dominion_admin_commander::DominionAdminCommand",
                contracts().dominion
            )),
            json!({ "id": { "id": payload }, "kind": kind.to_string() }),
        );
        self.ledger.insert_dynamic_field(
            &payload,
            &DynamicFieldName::u8(0),
            self.payload_id(command, 2),
            TypeTag::new("0x2::dynamic_field::Field<u8, 0x1::ascii::String>"),
            json!({ "value": target.as_str().trim_start_matches("0x") }),
        );
        self.command(command, dominion, &admin_commander())
    }

    /// A command created under a commander no crank knows about.
    pub fn foreign(&self, command: &ObjectId, dominion: &ObjectId, commander: &TypeTag) -> Value {
        self.command(command, dominion, commander)
    }

    fn payload_id(&self, command: &ObjectId, n: u64) -> ObjectId {
        let base = command.as_str().trim_start_matches("0x").trim_start_matches('0');
        ObjectId::parse(&format!("{base}0{n}")).unwrap()
    }

    /// Raw `result` of a stored proposal.
    pub fn result(&self, proposal: &ObjectId) -> Value {
        self.ledger.fields(proposal).unwrap()["result"]["fields"].clone()
    }

    pub fn executed_count(&self, proposal: &ObjectId, option: usize) -> u64 {
        self.ledger.fields(proposal).unwrap()["options"][option]["fields"]
            ["executed_command_count"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    pub fn command_error(&self, proposal: &ObjectId, option: usize, position: usize) -> Value {
        self.ledger.fields(proposal).unwrap()["options"][option]["fields"]["commands"][position]
            ["fields"]["execution_error"]
            .clone()
    }
}
