//! In-process ledger for simulation and tests.
//!
//! Objects are stored as the same JSON content the node returns, so every
//! decoder runs unchanged against it. A submitted batch is interpreted against
//! a copy of the state and swapped in only if every call succeeds. Only the
//! governance and commander entry points the crank emits are understood.

use std::collections::{BTreeMap, BTreeSet};
use std::future::ready;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dominion_types::{
    Address, Argument, MoveCall, ObjectId, ObjectRef, OperationBatch, Phase, ProposalResult,
    Timeline, Timestamp, TypeTag,
};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::wire::U64;
use crate::{
    Coin, DynamicFieldName, LedgerError, LedgerFut, LedgerRead, LedgerSubmit, ObjectData,
    SubmitOutcome, SubmitStatus,
};

const TYPE_NAME: &str = "0x1::type_name::TypeName";
const FIRST_CREATED_OBJECT: u64 = 0xc0_0000;

#[derive(Debug, Clone)]
struct StoredObject {
    type_: TypeTag,
    fields: Value,
    version: u64,
}

impl StoredObject {
    fn data(&self, id: &ObjectId) -> ObjectData {
        ObjectData {
            object_id: id.clone(),
            version: self.version,
            digest: object_digest(id, self.version),
            type_: self.type_.clone(),
            fields: self.fields.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredCoin {
    owner: Address,
    coin_type: TypeTag,
    balance: u64,
    version: u64,
}

#[derive(Debug, Clone, Default)]
struct State {
    objects: BTreeMap<ObjectId, StoredObject>,
    dynamic_fields: BTreeMap<(ObjectId, String), ObjectId>,
    coins: BTreeMap<ObjectId, StoredCoin>,
    created: u64,
}

impl State {
    fn clock(&self) -> Option<Timestamp> {
        let clock = self.objects.get(&ObjectId::clock())?;
        serde_json::from_value::<U64>(clock.fields.get("timestamp_ms")?.clone())
            .ok()
            .map(|t| t.0)
    }
}

/// A ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
    failing: Mutex<BTreeSet<ObjectId>>,
    submitted: Mutex<Vec<OperationBatch>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clock(&self, now: Timestamp) {
        let clock = ObjectId::clock();
        self.insert_object(
            clock.clone(),
            TypeTag::new("0x2::clock::Clock"),
            json!({ "id": { "id": clock }, "timestamp_ms": now.to_string() }),
        );
    }

    /// Remove the clock object so every clock read fails.
    pub fn clear_clock(&self) {
        lock(&self.state).objects.remove(&ObjectId::clock());
    }

    pub fn insert_object(&self, id: ObjectId, type_: TypeTag, fields: Value) {
        let mut state = lock(&self.state);
        let version = state.objects.get(&id).map_or(1, |o| o.version + 1);
        state.objects.insert(
            id,
            StoredObject {
                type_,
                fields,
                version,
            },
        );
    }

    pub fn insert_dynamic_field(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
        id: ObjectId,
        type_: TypeTag,
        fields: Value,
    ) {
        lock(&self.state)
            .dynamic_fields
            .insert((parent.clone(), field_key(name)), id.clone());
        self.insert_object(id, type_, fields);
    }

    pub fn insert_coin(&self, owner: &Address, coin_type: &TypeTag, id: ObjectId, balance: u64) {
        lock(&self.state).coins.insert(
            id,
            StoredCoin {
                owner: owner.clone(),
                coin_type: coin_type.clone(),
                balance,
                version: 1,
            },
        );
    }

    /// Make every read of `id` (or of coins it owns) fail with a transport error.
    pub fn fail_reads_of(&self, id: ObjectId) {
        lock(&self.failing).insert(id);
    }

    pub fn restore_reads(&self) {
        lock(&self.failing).clear();
    }

    #[must_use]
    pub fn fields(&self, id: &ObjectId) -> Option<Value> {
        lock(&self.state).objects.get(id).map(|o| o.fields.clone())
    }

    #[must_use]
    pub fn balance(&self, owner: &Address, coin_type: &TypeTag) -> u64 {
        lock(&self.state)
            .coins
            .values()
            .filter(|c| &c.owner == owner && &c.coin_type == coin_type)
            .map(|c| c.balance)
            .sum()
    }

    /// Every batch submitted so far, accepted or not.
    #[must_use]
    pub fn submissions(&self) -> Vec<OperationBatch> {
        lock(&self.submitted).clone()
    }

    fn check_readable(&self, id: &ObjectId) -> Result<(), LedgerError> {
        if lock(&self.failing).contains(id) {
            return Err(LedgerError::Transport {
                attempts: 1,
                message: format!("read of {id} failed"),
            });
        }
        Ok(())
    }

    fn read(&self, id: &ObjectId) -> Result<ObjectData, LedgerError> {
        self.check_readable(id)?;
        lock(&self.state)
            .objects
            .get(id)
            .map(|o| o.data(id))
            .ok_or_else(|| LedgerError::ObjectNotFound { id: id.clone() })
    }

    fn read_dynamic_field(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<ObjectData, LedgerError> {
        self.check_readable(parent)?;
        let state = lock(&self.state);
        state
            .dynamic_fields
            .get(&(parent.clone(), field_key(name)))
            .and_then(|id| state.objects.get(id).map(|o| o.data(id)))
            .ok_or_else(|| {
                LedgerError::decode(
                    format!("dynamic field {} of {parent}", name.value),
                    "field does not exist",
                )
            })
    }

    fn read_coins(&self, owner: &Address, coin_type: &TypeTag) -> Result<Vec<Coin>, LedgerError> {
        self.check_readable(owner)?;
        Ok(lock(&self.state)
            .coins
            .iter()
            .filter(|(_, c)| &c.owner == owner && &c.coin_type == coin_type)
            .map(|(id, c)| Coin {
                coin_type: c.coin_type.clone(),
                object_ref: coin_ref(id, c.version),
                balance: c.balance,
            })
            .collect())
    }

    fn apply(
        &self,
        batch: &OperationBatch,
        sender: &Address,
        gas_budget: u64,
    ) -> Result<SubmitOutcome, LedgerError> {
        let digest = {
            let mut submitted = lock(&self.submitted);
            submitted.push(batch.clone());
            batch_digest(batch, sender, submitted.len())
        };
        if batch.is_empty() {
            return Err(LedgerError::rejected("batch has no calls"));
        }

        let mut state = lock(&self.state);
        let now = state
            .clock()
            .ok_or_else(|| LedgerError::rejected("clock object unavailable"))?;
        if gas_budget == 0 {
            return Ok(failure(digest, "InsufficientGas".to_string()));
        }

        let mut execution = Execution::new(state.clone(), now);
        match execution.run(batch) {
            Ok(()) => {
                *state = execution.state;
                tracing::debug!(%digest, calls = batch.len(), "memory ledger applied batch");
                Ok(SubmitOutcome {
                    digest,
                    status: SubmitStatus::Success,
                    errors: Vec::new(),
                })
            }
            Err(CallError::Abort(error)) => {
                tracing::debug!(%digest, %error, "memory ledger aborted batch");
                Ok(failure(digest, error))
            }
            Err(CallError::Invalid(message)) => Err(LedgerError::Rejected { message }),
        }
    }
}

fn failure(digest: String, error: String) -> SubmitOutcome {
    SubmitOutcome {
        digest,
        status: SubmitStatus::Failure { error },
        errors: Vec::new(),
    }
}

impl LedgerRead for MemoryLedger {
    fn get_object<'a>(&'a self, id: &'a ObjectId) -> LedgerFut<'a, ObjectData> {
        Box::pin(ready(self.read(id)))
    }

    fn multi_get_objects<'a>(
        &'a self,
        ids: &'a [ObjectId],
    ) -> LedgerFut<'a, Vec<Result<ObjectData, LedgerError>>> {
        Box::pin(ready(Ok(ids.iter().map(|id| self.read(id)).collect())))
    }

    fn get_dynamic_field_object<'a>(
        &'a self,
        parent: &'a ObjectId,
        name: &'a DynamicFieldName,
    ) -> LedgerFut<'a, ObjectData> {
        Box::pin(ready(self.read_dynamic_field(parent, name)))
    }

    fn get_coins<'a>(
        &'a self,
        owner: &'a Address,
        coin_type: &'a TypeTag,
    ) -> LedgerFut<'a, Vec<Coin>> {
        Box::pin(ready(self.read_coins(owner, coin_type)))
    }
}

impl LedgerSubmit for MemoryLedger {
    fn submit<'a>(
        &'a self,
        batch: &'a OperationBatch,
        sender: &'a Address,
        gas_budget: u64,
    ) -> LedgerFut<'a, SubmitOutcome> {
        Box::pin(ready(self.apply(batch, sender, gas_budget)))
    }
}

fn field_key(name: &DynamicFieldName) -> String {
    format!("{}:{}", name.type_, name.value)
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn object_digest(id: &ObjectId, version: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_str().as_bytes());
    hasher.update(version.to_le_bytes());
    hex_digest(hasher)
}

fn batch_digest(batch: &OperationBatch, sender: &Address, sequence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(batch).unwrap_or_default());
    hasher.update(sender.as_str().as_bytes());
    hasher.update((sequence as u64).to_le_bytes());
    hex_digest(hasher)
}

fn coin_ref(id: &ObjectId, version: u64) -> ObjectRef {
    ObjectRef {
        object_id: id.clone(),
        version,
        digest: object_digest(id, version),
    }
}

// ── Batch interpretation ────────────────────────────────────────────────────

/// A value returned by one call and consumable by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Unit,
    /// Authority to run one command against a dominion. Must be consumed.
    Executor {
        proposal: ObjectId,
        command: ObjectId,
        dominion: ObjectId,
    },
    /// Receipt the proposal needs back to commit. Must be consumed.
    ProposalExecutor {
        proposal: ObjectId,
        command: ObjectId,
    },
    Command(ObjectId),
}

impl Slot {
    fn is_hot_potato(&self) -> bool {
        matches!(self, Slot::Executor { .. } | Slot::ProposalExecutor { .. })
    }
}

enum CallError {
    /// Execution aborted; the batch is charged and reported as failed.
    Abort(String),
    /// The batch is malformed and never executes.
    Invalid(String),
}

impl CallError {
    fn at(self, index: usize, call: &MoveCall) -> Self {
        match self {
            CallError::Abort(m) => CallError::Abort(format!("{} (call {index}): {m}", call.target)),
            CallError::Invalid(m) => {
                CallError::Invalid(format!("{} (call {index}): {m}", call.target))
            }
        }
    }
}

fn abort(message: impl Into<String>) -> CallError {
    CallError::Abort(message.into())
}

fn invalid(message: impl Into<String>) -> CallError {
    CallError::Invalid(message.into())
}

struct Execution {
    state: State,
    now: Timestamp,
    /// Coin versions at the start of the batch; receiving refs are checked against these.
    input_versions: BTreeMap<ObjectId, u64>,
    results: Vec<Vec<Option<Slot>>>,
}

impl Execution {
    fn new(state: State, now: Timestamp) -> Self {
        let input_versions = state
            .coins
            .iter()
            .map(|(id, c)| (id.clone(), c.version))
            .collect();
        Self {
            state,
            now,
            input_versions,
            results: Vec::new(),
        }
    }

    fn run(&mut self, batch: &OperationBatch) -> Result<(), CallError> {
        for (index, call) in batch.calls().iter().enumerate() {
            let returned = self.call(call).map_err(|e| e.at(index, call))?;
            self.results
                .push(returned.into_iter().map(Some).collect());
        }
        if let Some(slot) = self
            .results
            .iter()
            .flatten()
            .flatten()
            .find(|s| s.is_hot_potato())
        {
            return Err(invalid(format!("unconsumed result {slot:?}")));
        }
        Ok(())
    }

    fn call(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        match (call.target.module.as_str(), call.target.function.as_str()) {
            ("proposal", "finalize") => self.finalize(call),
            ("proposal", "execute_next_command") => self.execute_next_command(call),
            ("proposal", "commit_command_execution") => self.commit_command_execution(call),
            ("coin_commander", "join_coins") => self.join_coins(call),
            ("coin_commander", "execute_transfer") => self.execute_transfer(call),
            ("dominion_admin_commander", "execute") => self.execute_admin(call),
            _ => Err(invalid("unknown function")),
        }
    }

    // ── Governance ──

    fn finalize(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 2)?;
        let proposal = object_arg(call, 0)?.clone();
        expect_clock(call, 1)?;
        self.check_proposal_type(call, &proposal)?;

        let now = self.now;
        let result_type = format!("{}::proposal::ProposalResult", call.target.package);
        let fields = &mut self.object_mut(&proposal)?.fields;
        let phase = phase_of(fields, now)?;
        if phase != Phase::FinalizationRequired {
            return Err(abort(format!("proposal is {phase}, not finalizationRequired")));
        }

        let winner = winning_option(fields)?;
        let executed_at = match winner {
            Some(index) if commands_of(option_at(fields, index)?)?.is_empty() => Some(now),
            _ => None,
        };
        fields["result"] = json!({
            "type": result_type,
            "fields": {
                "option_index": winner.map(|i| i.to_string()),
                "finalized_at": now.to_string(),
                "executed_at": executed_at.map(|t| t.to_string()),
            }
        });
        Ok(vec![Slot::Unit])
    }

    fn execute_next_command(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 4)?;
        let proposal = object_arg(call, 0)?.clone();
        let governance = object_arg(call, 1)?.clone();
        let dominion = object_arg(call, 2)?.clone();
        expect_clock(call, 3)?;
        self.check_proposal_type(call, &proposal)?;

        let fields = &self.object(&proposal)?.fields;
        let phase = phase_of(fields, self.now)?;
        if phase != Phase::Executing {
            return Err(abort(format!("proposal is {phase}, not executing")));
        }
        if fields.get("is_executing").and_then(Value::as_bool) == Some(true) {
            return Err(abort("a command of this proposal is already executing"));
        }
        if id_at(fields, "/governance_id")? != governance {
            return Err(abort("governance does not own this proposal"));
        }
        let governed = id_at(
            &self.object(&governance)?.fields,
            "/dominion_owner_cap/fields/dominion_id",
        )?;
        if governed != dominion {
            return Err(abort("governance does not control this dominion"));
        }
        let (_, _, command) =
            cursor_command(fields)?.ok_or_else(|| abort("no command left to execute"))?;

        self.object_mut(&proposal)?.fields["is_executing"] = Value::Bool(true);
        Ok(vec![
            Slot::Executor {
                proposal: proposal.clone(),
                command: command.clone(),
                dominion,
            },
            Slot::ProposalExecutor { proposal, command },
        ])
    }

    fn commit_command_execution(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 4)?;
        let proposal = object_arg(call, 0)?.clone();
        expect_clock(call, 3)?;
        self.check_proposal_type(call, &proposal)?;

        let Slot::Command(executed) = self.take(&call.arguments[1])? else {
            return Err(invalid("argument 1 is not an executed command"));
        };
        let Slot::ProposalExecutor {
            proposal: bound,
            command: expected,
        } = self.take(&call.arguments[2])?
        else {
            return Err(invalid("argument 2 is not a proposal executor"));
        };
        if bound != proposal {
            return Err(abort("proposal executor belongs to another proposal"));
        }
        if executed != expected {
            return Err(abort(format!(
                "stale cursor: executed {executed} but {expected} was issued"
            )));
        }

        let now = self.now;
        let fields = &mut self.object_mut(&proposal)?.fields;
        let (option, position, at_cursor) =
            cursor_command(fields)?.ok_or_else(|| abort("stale cursor: option is exhausted"))?;
        if at_cursor != executed {
            return Err(abort(format!(
                "stale cursor: {executed} is not the next command"
            )));
        }

        let command = command_fields_mut(fields, option, position)
            .ok_or_else(|| invalid("command vanished from its option"))?;
        command["is_executed"] = Value::Bool(true);

        let total = commands_of(option_at(fields, option as u64)?)?.len();
        let advanced = position + 1;
        fields["options"][option]["fields"]["executed_command_count"] =
            Value::String(advanced.to_string());
        fields["is_executing"] = Value::Bool(false);
        if advanced == total {
            fields["result"]["fields"]["executed_at"] = Value::String(now.to_string());
        }
        Ok(vec![Slot::Unit])
    }

    // ── Commanders ──

    fn join_coins(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 3)?;
        let coin_type = single_type_argument(call)?.clone();
        let dominion = object_arg(call, 0)?.clone();
        let target = self.receive(call, 1, &dominion, &coin_type)?;
        let source = self.receive(call, 2, &dominion, &coin_type)?;
        if target == source {
            return Err(invalid("cannot join a coin into itself"));
        }

        let amount = self
            .state
            .coins
            .remove(&source)
            .map(|c| c.balance)
            .unwrap_or_default();
        if let Some(coin) = self.state.coins.get_mut(&target) {
            coin.balance = coin.balance.saturating_add(amount);
            coin.version += 1;
        }
        Ok(vec![Slot::Unit])
    }

    fn execute_transfer(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 3)?;
        let coin_type = single_type_argument(call)?.clone();
        let (proposal, command) = self.take_executor(call)?;

        let (payload_id, payload) = self.dynamic_object(&command, 1)?;
        let Some(payload_coin) = payload
            .type_
            .type_argument("coin_commander", "CoinCommand")
        else {
            return Err(abort(format!(
                "executor is bound to a {} command",
                payload.type_
            )));
        };
        if payload_coin != coin_type {
            return Err(abort(format!(
                "type argument {coin_type} does not match command coin {payload_coin}"
            )));
        }
        let kind = u64_at(&payload.fields, "kind")?;
        if kind != 0 {
            return Err(abort(format!("unknown coin command kind {kind}")));
        }
        let recipient = self
            .dynamic_value(&payload_id, 0)?
            .as_str()
            .and_then(|s| ObjectId::parse(s).ok())
            .ok_or_else(|| invalid("transfer recipient is not an address"))?;
        let amount = serde_json::from_value::<U64>(self.dynamic_value(&payload_id, 1)?.clone())
            .map_err(|e| invalid(format!("transfer amount: {e}")))?
            .0;

        let dominion = object_arg(call, 1)?.clone();
        let coin_id = self.receive(call, 2, &dominion, &coin_type)?;
        let available = self.state.coins.get(&coin_id).map_or(0, |c| c.balance);
        if available < amount {
            self.record_error(
                &proposal,
                &command,
                format!("insufficient balance: {available} < {amount}"),
            )?;
            return Ok(vec![Slot::Command(command)]);
        }

        if let Some(coin) = self.state.coins.get_mut(&coin_id) {
            coin.balance -= amount;
            coin.version += 1;
        }
        let created = ObjectId::parse(&format!(
            "{:x}",
            FIRST_CREATED_OBJECT + self.state.created
        ))
        .map_err(|e| invalid(e.to_string()))?;
        self.state.created += 1;
        self.state.coins.insert(
            created,
            StoredCoin {
                owner: recipient,
                coin_type,
                balance: amount,
                version: 1,
            },
        );
        Ok(vec![Slot::Command(command)])
    }

    fn execute_admin(&mut self, call: &MoveCall) -> Result<Vec<Slot>, CallError> {
        arity(call, 2)?;
        let (proposal, command) = self.take_executor(call)?;

        let (payload_id, payload) = self.dynamic_object(&command, 1)?;
        if !payload
            .type_
            .as_str()
            .ends_with("::dominion_admin_commander::DominionAdminCommand")
        {
            return Err(abort(format!(
                "executor is bound to a {} command",
                payload.type_
            )));
        }
        let kind = u64_at(&payload.fields, "kind")?;
        let name = self
            .dynamic_value(&payload_id, 0)?
            .as_str()
            .ok_or_else(|| invalid("commander name is not a string"))?
            .to_string();
        let tag = TypeTag::from_type_name(&name);

        let dominion = object_arg(call, 1)?.clone();
        let fields = &mut self.object_mut(&dominion)?.fields;
        let contents = fields
            .pointer_mut("/commanders/fields/contents")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| invalid("dominion has no commander set"))?;
        let enabled = contents.iter().any(|c| {
            c.pointer("/fields/name")
                .and_then(Value::as_str)
                .is_some_and(|n| TypeTag::from_type_name(n) == tag)
        });

        let error = match (kind, enabled) {
            (0, true) => Some(format!("commander {tag} is already enabled")),
            (0, false) => {
                contents.push(json!({ "type": TYPE_NAME, "fields": { "name": name } }));
                None
            }
            (1, false) => Some(format!("commander {tag} is not enabled")),
            (1, true) => {
                contents.retain(|c| {
                    c.pointer("/fields/name")
                        .and_then(Value::as_str)
                        .is_none_or(|n| TypeTag::from_type_name(n) != tag)
                });
                None
            }
            (kind, _) => return Err(abort(format!("unknown admin command kind {kind}"))),
        };
        if let Some(error) = error {
            self.record_error(&proposal, &command, error)?;
        }
        Ok(vec![Slot::Command(command)])
    }

    // ── Helpers ──

    fn object(&self, id: &ObjectId) -> Result<&StoredObject, CallError> {
        self.state
            .objects
            .get(id)
            .ok_or_else(|| invalid(format!("object {id} does not exist")))
    }

    fn object_mut(&mut self, id: &ObjectId) -> Result<&mut StoredObject, CallError> {
        let object = self
            .state
            .objects
            .get_mut(id)
            .ok_or_else(|| invalid(format!("object {id} does not exist")))?;
        object.version += 1;
        Ok(object)
    }

    fn dynamic_object(&self, parent: &ObjectId, key: u8) -> Result<(ObjectId, StoredObject), CallError> {
        let id = self
            .state
            .dynamic_fields
            .get(&(parent.clone(), field_key(&DynamicFieldName::u8(key))))
            .ok_or_else(|| invalid(format!("{parent} has no dynamic field {key}")))?;
        Ok((id.clone(), self.object(id)?.clone()))
    }

    fn dynamic_value(&self, parent: &ObjectId, key: u8) -> Result<&Value, CallError> {
        let id = self
            .state
            .dynamic_fields
            .get(&(parent.clone(), field_key(&DynamicFieldName::u8(key))))
            .ok_or_else(|| invalid(format!("{parent} has no dynamic field {key}")))?;
        self.object(id)?
            .fields
            .get("value")
            .ok_or_else(|| invalid(format!("dynamic field {key} of {parent} has no value")))
    }

    fn check_proposal_type(&self, call: &MoveCall, proposal: &ObjectId) -> Result<(), CallError> {
        let coin = self
            .object(proposal)?
            .type_
            .type_argument("proposal", "Proposal")
            .ok_or_else(|| invalid(format!("{proposal} is not a proposal")))?;
        let given = single_type_argument(call)?;
        if *given != coin {
            return Err(invalid(format!(
                "type argument {given} does not match proposal coin {coin}"
            )));
        }
        Ok(())
    }

    fn take(&mut self, argument: &Argument) -> Result<Slot, CallError> {
        let (call, index) = match argument {
            Argument::Result(call) => (*call, 0),
            Argument::NestedResult(call, index) => (*call, *index),
            other => return Err(invalid(format!("expected a call result, got {other:?}"))),
        };
        self.results
            .get_mut(usize::from(call))
            .and_then(|r| r.get_mut(usize::from(index)))
            .ok_or_else(|| invalid(format!("result {call}.{index} does not exist")))?
            .take()
            .ok_or_else(|| invalid(format!("result {call}.{index} was already used")))
    }

    /// Consume the executor in argument 0, returning its proposal and command.
    fn take_executor(&mut self, call: &MoveCall) -> Result<(ObjectId, ObjectId), CallError> {
        let Slot::Executor {
            proposal,
            command,
            dominion,
        } = self.take(&call.arguments[0])?
        else {
            return Err(invalid("argument 0 is not an executor"));
        };
        if object_arg(call, 1)? != &dominion {
            return Err(abort("executor is bound to another dominion"));
        }
        Ok((proposal, command))
    }

    /// Validate a receiving reference to a coin owned by `owner`.
    fn receive(
        &self,
        call: &MoveCall,
        index: usize,
        owner: &Address,
        coin_type: &TypeTag,
    ) -> Result<ObjectId, CallError> {
        let Argument::Receiving(reference) = &call.arguments[index] else {
            return Err(invalid(format!("argument {index} is not a receiving reference")));
        };
        let id = &reference.object_id;
        let coin = self
            .state
            .coins
            .get(id)
            .ok_or_else(|| abort(format!("coin {id} no longer exists")))?;
        if self.input_versions.get(id) != Some(&reference.version) {
            return Err(abort(format!(
                "stale reference to coin {id} at version {}",
                reference.version
            )));
        }
        if &coin.owner != owner || &coin.coin_type != coin_type {
            return Err(abort(format!("coin {id} is not a {coin_type} owned by {owner}")));
        }
        Ok(id.clone())
    }

    fn record_error(
        &mut self,
        proposal: &ObjectId,
        command: &ObjectId,
        error: String,
    ) -> Result<(), CallError> {
        tracing::debug!(%command, %error, "command execution failed");
        let fields = &mut self.object_mut(proposal)?.fields;
        let (option, position, at_cursor) =
            cursor_command(fields)?.ok_or_else(|| invalid("no command at cursor"))?;
        if &at_cursor != command {
            return Err(abort(format!("stale cursor: {command} is not the next command")));
        }
        let fields = command_fields_mut(fields, option, position)
            .ok_or_else(|| invalid("command vanished from its option"))?;
        fields["execution_error"] = Value::String(error);
        Ok(())
    }
}

fn arity(call: &MoveCall, expected: usize) -> Result<(), CallError> {
    if call.arguments.len() == expected {
        Ok(())
    } else {
        Err(invalid(format!(
            "expected {expected} arguments, got {}",
            call.arguments.len()
        )))
    }
}

fn single_type_argument(call: &MoveCall) -> Result<&TypeTag, CallError> {
    match call.type_arguments.as_slice() {
        [tag] => Ok(tag),
        other => Err(invalid(format!(
            "expected 1 type argument, got {}",
            other.len()
        ))),
    }
}

fn object_arg(call: &MoveCall, index: usize) -> Result<&ObjectId, CallError> {
    match call.arguments.get(index) {
        Some(Argument::Object(id)) => Ok(id),
        other => Err(invalid(format!("argument {index} is not an object: {other:?}"))),
    }
}

fn expect_clock(call: &MoveCall, index: usize) -> Result<(), CallError> {
    if object_arg(call, index)? == &ObjectId::clock() {
        Ok(())
    } else {
        Err(invalid(format!("argument {index} is not the clock")))
    }
}

// ── Proposal content ──

fn u64_at(fields: &Value, key: &str) -> Result<u64, CallError> {
    let value = fields
        .get(key)
        .ok_or_else(|| invalid(format!("missing field {key}")))?;
    serde_json::from_value::<U64>(value.clone())
        .map(|n| n.0)
        .map_err(|e| invalid(format!("field {key}: {e}")))
}

fn opt_u64_at(fields: &Value, key: &str) -> Result<Option<u64>, CallError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => u64_at(fields, key).map(Some),
    }
}

fn id_at(fields: &Value, pointer: &str) -> Result<ObjectId, CallError> {
    fields
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| ObjectId::parse(s).ok())
        .ok_or_else(|| invalid(format!("missing id at {pointer}")))
}

fn result_of(fields: &Value) -> Result<Option<ProposalResult>, CallError> {
    let result = match fields.get("result") {
        None | Some(Value::Null) => return Ok(None),
        Some(result) => &result["fields"],
    };
    Ok(Some(ProposalResult {
        option_index: opt_u64_at(result, "option_index")?,
        finalized_at: u64_at(result, "finalized_at")?,
        executed_at: opt_u64_at(result, "executed_at")?,
    }))
}

fn phase_of(fields: &Value, now: Timestamp) -> Result<Phase, CallError> {
    let timeline = Timeline {
        voting_at: opt_u64_at(fields, "voting_at")?,
        max_voting_time: u64_at(fields, "max_voting_time")?,
        cool_off_time: u64_at(fields, "cool_off_time")?,
        hold_up_time: u64_at(fields, "hold_up_time")?,
    };
    Ok(timeline.phase(now, result_of(fields)?.as_ref()))
}

fn options(fields: &Value) -> Result<&Vec<Value>, CallError> {
    fields
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("proposal has no options"))
}

fn option_at(fields: &Value, index: u64) -> Result<&Value, CallError> {
    options(fields)?
        .get(index as usize)
        .ok_or_else(|| invalid(format!("option {index} does not exist")))
}

fn commands_of(option: &Value) -> Result<&Vec<Value>, CallError> {
    option
        .pointer("/fields/commands")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("option has no command list"))
}

fn command_fields_mut(fields: &mut Value, option: usize, position: usize) -> Option<&mut Value> {
    fields
        .get_mut("options")?
        .get_mut(option)?
        .get_mut("fields")?
        .get_mut("commands")?
        .get_mut(position)?
        .get_mut("fields")
}

/// Option index, cursor position and id of the next command to execute.
fn cursor_command(fields: &Value) -> Result<Option<(usize, usize, ObjectId)>, CallError> {
    let Some(option_index) = result_of(fields)?.and_then(|r| r.option_index) else {
        return Ok(None);
    };
    let option = option_at(fields, option_index)?;
    let position = u64_at(&option["fields"], "executed_command_count")? as usize;
    match commands_of(option)?.get(position) {
        Some(command) => Ok(Some((
            option_index as usize,
            position,
            id_at(command, "/fields/id/id")?,
        ))),
        None => Ok(None),
    }
}

/// Greatest-weight option (lowest index on ties) that at least matches the
/// deny weight, provided the total cast weight reaches the threshold.
fn winning_option(fields: &Value) -> Result<Option<u64>, CallError> {
    let deny = u64_at(fields, "deny_vote_weight")?;
    let cast = u64_at(fields, "total_options_vote_weight")?
        .saturating_add(deny)
        .saturating_add(u64_at(fields, "abstain_vote_weight")?);
    if cast < u64_at(fields, "vote_threshold")? {
        return Ok(None);
    }

    let mut best: Option<(u64, u64)> = None;
    for (index, option) in options(fields)?.iter().enumerate() {
        let weight = u64_at(&option["fields"], "vote_weight")?;
        if best.is_none_or(|(_, top)| weight > top) {
            best = Some((index as u64, weight));
        }
    }
    Ok(best.filter(|(_, weight)| *weight >= deny).map(|(index, _)| index))
}
