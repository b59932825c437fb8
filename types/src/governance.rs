//! Governance configuration, member stake records and votes.

use crate::ids::{ObjectId, TypeTag};

/// Voting configuration and proposal list attached to one dominion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Governance {
    pub id: ObjectId,
    pub dominion_id: ObjectId,
    pub coin_type: TypeTag,
    pub name: String,
    pub link: String,
    pub admin_cap_id: Option<ObjectId>,
    pub veto_cap_id: Option<ObjectId>,
    pub min_weight_to_create_proposal: u64,
    pub vote_threshold: u64,
    pub max_voting_time: u64,
    pub hold_up_time: u64,
    pub cool_off_time: u64,
    pub extra_weight_lock_time: u64,
    /// Spawned proposals in creation order.
    pub proposal_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    Option(u64),
    Abstain,
    Against,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub proposal_id: ObjectId,
    pub option_index: Option<u64>,
    pub is_abstain: bool,
    pub weight: u64,
}

impl Vote {
    #[must_use]
    pub fn choice(&self) -> VoteChoice {
        match (self.option_index, self.is_abstain) {
            (_, true) => VoteChoice::Abstain,
            (Some(index), false) => VoteChoice::Option(index),
            (None, false) => VoteChoice::Against,
        }
    }
}

/// A wallet's locked stake within one governance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ObjectId,
    pub governance_id: ObjectId,
    pub balance: u64,
    pub votes: Vec<Vote>,
}

impl Member {
    /// Weight of every outstanding vote.
    #[must_use]
    pub fn committed_weight(&self) -> u64 {
        self.votes
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.weight))
    }

    /// The member's votes on a single proposal.
    pub fn votes_on<'a>(&'a self, proposal: &'a ObjectId) -> impl Iterator<Item = &'a Vote> + 'a {
        self.votes.iter().filter(move |v| &v.proposal_id == proposal)
    }
}
