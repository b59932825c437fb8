//! Proposal reader: ledger objects to typed values.
//!
//! Every read goes to the ledger; nothing is cached between calls.

use dominion_ledger::{LedgerError, LedgerRead, ObjectData};
use dominion_types::{
    Command, CommandHeader, Dominion, Governance, Member, ObjectId, Proposal, ProposalOption,
    ProposalResult, Registry, Timestamp, TypeTag,
};

use crate::commander::CommanderRegistry;
use crate::error::ReadError;
use crate::wire::{self, CommandFields, ProposalFields};

pub struct ProposalReader<'a> {
    ledger: &'a dyn LedgerRead,
    commanders: &'a CommanderRegistry,
}

impl<'a> ProposalReader<'a> {
    #[must_use]
    pub fn new(ledger: &'a dyn LedgerRead, commanders: &'a CommanderRegistry) -> Self {
        Self { ledger, commanders }
    }

    pub async fn clock(&self) -> Result<Timestamp, LedgerError> {
        self.ledger.get_clock().await
    }

    pub async fn registry(&self, id: &ObjectId) -> Result<Registry, ReadError> {
        wire::registry(&self.ledger.get_object(id).await?)
    }

    pub async fn dominion(&self, id: &ObjectId) -> Result<Dominion, ReadError> {
        wire::dominion(&self.ledger.get_object(id).await?)
    }

    /// Dominions in request order; each slot fails independently.
    pub async fn dominions(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Result<Dominion, ReadError>>, LedgerError> {
        Ok(self
            .ledger
            .multi_get_objects(ids)
            .await?
            .into_iter()
            .map(|object| wire::dominion(&object?))
            .collect())
    }

    pub async fn governance(&self, id: &ObjectId) -> Result<Governance, ReadError> {
        wire::governance(&self.ledger.get_object(id).await?)
    }

    /// Governances in request order; each slot fails independently.
    pub async fn governances(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Result<Governance, ReadError>>, LedgerError> {
        Ok(self
            .ledger
            .multi_get_objects(ids)
            .await?
            .into_iter()
            .map(|object| wire::governance(&object?))
            .collect())
    }

    pub async fn proposal(&self, id: &ObjectId) -> Result<Proposal, ReadError> {
        let object = self.ledger.get_object(id).await?;
        self.decode_proposal(&object).await
    }

    /// Proposals in request order; a proposal that fails to decode does not
    /// affect the others. A listed id with no object behind it is malformed.
    pub async fn proposals(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Result<Proposal, ReadError>>, LedgerError> {
        let objects = self.ledger.multi_get_objects(ids).await?;
        let mut proposals = Vec::with_capacity(objects.len());
        for (id, object) in ids.iter().zip(objects) {
            proposals.push(match object {
                Ok(object) => self.decode_proposal(&object).await,
                Err(e) => Err(ReadError::payload(id, e)),
            });
        }
        Ok(proposals)
    }

    pub async fn member(&self, id: &ObjectId) -> Result<Member, ReadError> {
        wire::member(&self.ledger.get_object(id).await?)
    }

    async fn decode_proposal(&self, object: &ObjectData) -> Result<Proposal, ReadError> {
        let coin_type = wire::generic_type(object, "proposal", "Proposal")?;
        let raw: ProposalFields = wire::fields(object)?;

        let mut options = Vec::with_capacity(raw.options.len());
        for option in raw.options {
            let option = option.fields;
            let mut commands = Vec::with_capacity(option.commands.len());
            for command in option.commands {
                commands.push(self.decode_command(command.fields).await?);
            }
            let count = commands.len();
            let executed = option.executed_command_count.0;
            let decoded = ProposalOption::new(commands, option.label, option.vote_weight.0, executed)
                .ok_or_else(|| {
                    ReadError::malformed(
                        &object.object_id,
                        format!("executed_command_count {executed} exceeds {count} commands"),
                    )
                })?;
            options.push(decoded);
        }

        if options.is_empty() {
            return Err(ReadError::malformed(&object.object_id, "proposal has no options"));
        }
        let result: Option<ProposalResult> = raw.result.map(|r| r.fields.into());
        if let Some(index) = result.as_ref().and_then(|r| r.option_index)
            && usize::try_from(index).ok().is_none_or(|i| i >= options.len())
        {
            return Err(ReadError::malformed(
                &object.object_id,
                format!("winning option {index} of {} options", options.len()),
            ));
        }

        Ok(Proposal {
            id: raw.id.id,
            governance_id: raw.governance_id,
            coin_type,
            name: raw.name,
            link: raw.link,
            created_at: raw.created_at.0,
            voting_at: raw.voting_at.map(|t| t.0),
            max_voting_time: raw.max_voting_time.0,
            hold_up_time: raw.hold_up_time.0,
            cool_off_time: raw.cool_off_time.0,
            extra_weight_lock_time: raw.extra_weight_lock_time.0,
            vote_threshold: raw.vote_threshold.0,
            abstain_vote_weight: raw.abstain_vote_weight.0,
            deny_vote_weight: raw.deny_vote_weight.0,
            total_options_vote_weight: raw.total_options_vote_weight.0,
            is_executing: raw.is_executing,
            options,
            result,
        })
    }

    async fn decode_command(&self, raw: CommandFields) -> Result<Command, ReadError> {
        let header = CommandHeader {
            id: raw.id.id,
            commander: TypeTag::from_type_name(&raw.commander.fields.name),
            dominion_id: raw.dominion_id,
            execution_error: raw.execution_error,
            is_executed: raw.is_executed,
        };
        let commander = self.commanders.resolve(&header.id, &header.commander)?;
        let action = commander.decode(self.ledger, &header).await?;
        Ok(Command { header, action })
    }
}
