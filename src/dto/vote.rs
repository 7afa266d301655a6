use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, room::RequesterInput},
    state::vote::{VoteAction, VoteOutcome, VoteSession},
};

/// Open a vote on a contested action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProposeVoteRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
    pub action: VoteAction,
    /// Members allowed to vote, usually the listeners of the room.
    #[validate(range(min = 1, max = 10000))]
    pub eligible_voters: usize,
}

/// State of a vote as exposed by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteSummary {
    pub id: Uuid,
    pub room: String,
    pub action: VoteAction,
    /// What the vote applies to, such as the targeted track.
    #[schema(value_type = Object)]
    pub subject: Value,
    pub proposer: String,
    pub quorum: usize,
    /// Confirming voters in the order they voted.
    pub confirmations: Vec<String>,
    pub rejections: usize,
    pub outcome: VoteOutcome,
    /// RFC3339 deadline after which the vote times out.
    pub deadline: String,
}

impl From<&VoteSession> for VoteSummary {
    fn from(vote: &VoteSession) -> Self {
        Self {
            id: vote.id(),
            room: vote.room().to_string(),
            action: vote.action(),
            subject: vote.attributes().clone(),
            proposer: vote.proposer().to_string(),
            quorum: vote.quorum(),
            confirmations: vote.confirmations().map(|u| u.to_string()).collect(),
            rejections: vote.rejection_count(),
            outcome: vote.outcome(),
            deadline: format_system_time(vote.deadline()),
        }
    }
}

/// Vote state after a confirmation, with the action result when it completed the quorum.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmVoteResponse {
    pub vote: VoteSummary,
    /// Result of the applied action.
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    /// Reason the applied action failed.
    pub error: Option<String>,
}
