//! Move content layouts of the governance, dominion and registry objects.
//!
//! Nested structs arrive as `{ "type": …, "fields": { … } }`; `u64` values are
//! decimal strings. These shapes only exist to be converted into the typed
//! model.

use std::collections::BTreeSet;

use dominion_ledger::{ObjectData, U64};
use dominion_types::{
    Address, Dominion, Entry, Governance, Member, ObjectId, ProposalResult, Registry, TypeTag,
    Vote,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ReadError;

#[derive(Debug, Deserialize)]
pub(crate) struct Nested<T> {
    pub fields: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Uid {
    pub id: ObjectId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TypeName {
    pub name: String,
}

/// Deserialize the whole field map of `object`.
pub(crate) fn fields<T: DeserializeOwned>(object: &ObjectData) -> Result<T, ReadError> {
    T::deserialize(&object.fields).map_err(|e| ReadError::malformed(&object.object_id, e.to_string()))
}

/// Deserialize one named field of `object`.
pub(crate) fn field<T: DeserializeOwned>(object: &ObjectData, name: &str) -> Result<T, ReadError> {
    let value = object
        .fields
        .get(name)
        .ok_or_else(|| ReadError::malformed(&object.object_id, format!("missing field {name}")))?;
    T::deserialize(value)
        .map_err(|e| ReadError::malformed(&object.object_id, format!("field {name}: {e}")))
}

/// Generic argument of an object typed `<pkg>::{module}::{name}<T>`.
pub(crate) fn generic_type(
    object: &ObjectData,
    module: &str,
    name: &str,
) -> Result<TypeTag, ReadError> {
    object.type_.type_argument(module, name).ok_or_else(|| {
        ReadError::malformed(
            &object.object_id,
            format!("expected a {module}::{name}, got {}", object.type_),
        )
    })
}

/// Check the struct name of `object`, ignoring any generic arguments.
pub(crate) fn expect_struct(object: &ObjectData, module: &str, name: &str) -> Result<(), ReadError> {
    let tag = object.type_.as_str();
    let head = tag.split_once('<').map_or(tag, |(head, _)| head);
    if head.ends_with(&format!("::{module}::{name}")) {
        Ok(())
    } else {
        Err(ReadError::malformed(
            &object.object_id,
            format!("expected a {module}::{name}, got {}", object.type_),
        ))
    }
}

/// Move stores "no value" for some string fields as the empty string.
fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

// ── Proposal ──

#[derive(Debug, Deserialize)]
pub(crate) struct ProposalFields {
    pub id: Uid,
    pub governance_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub link: String,
    pub created_at: U64,
    pub voting_at: Option<U64>,
    pub max_voting_time: U64,
    pub hold_up_time: U64,
    pub cool_off_time: U64,
    pub extra_weight_lock_time: U64,
    pub vote_threshold: U64,
    pub abstain_vote_weight: U64,
    pub deny_vote_weight: U64,
    pub total_options_vote_weight: U64,
    pub is_executing: bool,
    pub options: Vec<Nested<OptionFields>>,
    pub result: Option<Nested<ResultFields>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptionFields {
    pub commands: Vec<Nested<CommandFields>>,
    pub label: String,
    pub vote_weight: U64,
    pub executed_command_count: U64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommandFields {
    pub id: Uid,
    pub commander: Nested<TypeName>,
    pub dominion_id: ObjectId,
    pub execution_error: Option<String>,
    pub is_executed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultFields {
    pub option_index: Option<U64>,
    pub finalized_at: U64,
    pub executed_at: Option<U64>,
}

impl From<ResultFields> for ProposalResult {
    fn from(raw: ResultFields) -> Self {
        ProposalResult {
            option_index: raw.option_index.map(|i| i.0),
            finalized_at: raw.finalized_at.0,
            executed_at: raw.executed_at.map(|t| t.0),
        }
    }
}

// ── Governance ──

#[derive(Debug, Deserialize)]
struct GovernanceFields {
    id: Uid,
    name: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    admin_cap_id: Option<ObjectId>,
    #[serde(default)]
    veto_cap_id: Option<ObjectId>,
    dominion_owner_cap: Nested<OwnerCapFields>,
    min_weight_to_create_proposal: U64,
    vote_threshold: U64,
    max_voting_time: U64,
    hold_up_time: U64,
    cool_off_time: U64,
    extra_weight_lock_time: U64,
    proposal_ids: Vec<ObjectId>,
}

#[derive(Debug, Deserialize)]
struct OwnerCapFields {
    dominion_id: ObjectId,
}

pub(crate) fn governance(object: &ObjectData) -> Result<Governance, ReadError> {
    let coin_type = generic_type(object, "governance", "Governance")?;
    let raw: GovernanceFields = fields(object)?;
    Ok(Governance {
        id: raw.id.id,
        dominion_id: raw.dominion_owner_cap.fields.dominion_id,
        coin_type,
        name: raw.name,
        link: raw.link,
        admin_cap_id: raw.admin_cap_id,
        veto_cap_id: raw.veto_cap_id,
        min_weight_to_create_proposal: raw.min_weight_to_create_proposal.0,
        vote_threshold: raw.vote_threshold.0,
        max_voting_time: raw.max_voting_time.0,
        hold_up_time: raw.hold_up_time.0,
        cool_off_time: raw.cool_off_time.0,
        extra_weight_lock_time: raw.extra_weight_lock_time.0,
        proposal_ids: raw.proposal_ids,
    })
}

// ── Dominion and registry ──

#[derive(Debug, Deserialize)]
struct DominionFields {
    id: Uid,
    admin_address: Address,
    owner_address: Address,
    commanders: Nested<VecSetFields>,
}

#[derive(Debug, Deserialize)]
struct VecSetFields {
    contents: Vec<Nested<TypeName>>,
}

pub(crate) fn dominion(object: &ObjectData) -> Result<Dominion, ReadError> {
    expect_struct(object, "dominion", "Dominion")?;
    let raw: DominionFields = fields(object)?;
    Ok(Dominion {
        id: raw.id.id,
        admin_address: raw.admin_address,
        owner_address: raw.owner_address,
        commanders: raw
            .commanders
            .fields
            .contents
            .into_iter()
            .map(|c| TypeTag::from_type_name(&c.fields.name))
            .collect::<BTreeSet<_>>(),
    })
}

#[derive(Debug, Deserialize)]
struct RegistryFields {
    id: Uid,
    #[serde(default)]
    owner_cap_id: Option<ObjectId>,
    #[serde(default)]
    policy_address: Option<Address>,
    entries: Vec<Nested<EntryFields>>,
}

#[derive(Debug, Deserialize)]
struct EntryFields {
    dominion_id: ObjectId,
    #[serde(default)]
    url_name: String,
}

pub(crate) fn registry(object: &ObjectData) -> Result<Registry, ReadError> {
    expect_struct(object, "dominion_registry", "DominionRegistry")?;
    let raw: RegistryFields = fields(object)?;
    Ok(Registry {
        id: raw.id.id,
        owner_cap_id: raw.owner_cap_id,
        policy_address: raw.policy_address,
        entries: raw
            .entries
            .into_iter()
            .map(|e| Entry {
                dominion_id: e.fields.dominion_id,
                url_name: non_empty(e.fields.url_name),
            })
            .collect(),
    })
}

// ── Member ──

#[derive(Debug, Deserialize)]
struct MemberFields {
    id: Uid,
    governance_id: ObjectId,
    balance: U64,
    #[serde(default)]
    votes: Vec<Nested<VoteFields>>,
}

#[derive(Debug, Deserialize)]
struct VoteFields {
    proposal_id: ObjectId,
    option_index: Option<U64>,
    #[serde(default)]
    is_abstain: bool,
    weight: U64,
}

pub(crate) fn member(object: &ObjectData) -> Result<Member, ReadError> {
    expect_struct(object, "member", "Member")?;
    let raw: MemberFields = fields(object)?;
    Ok(Member {
        id: raw.id.id,
        governance_id: raw.governance_id,
        balance: raw.balance.0,
        votes: raw
            .votes
            .into_iter()
            .map(|v| Vote {
                proposal_id: v.fields.proposal_id,
                option_index: v.fields.option_index.map(|i| i.0),
                is_abstain: v.fields.is_abstain,
                weight: v.fields.weight.0,
            })
            .collect(),
    })
}

/// The `value` field of a dynamic field object, as a string.
pub(crate) fn string_value(object: &ObjectData) -> Result<String, ReadError> {
    match object.fields.get("value") {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ReadError::malformed(
            &object.object_id,
            "dynamic field value is not a string",
        )),
    }
}
