//! Service helpers running group votes on contested room commands.

use futures::FutureExt;
use serde_json::{Value, json};

use crate::{
    dto::{
        room::RequesterInput,
        vote::{ConfirmVoteResponse, ProposeVoteRequest, VoteSummary},
    },
    error::ServiceError,
    state::{
        SharedState,
        auth::Authority,
        registry::SessionRegistry,
        sequencer::{ApplyFn, Proposal},
        track::{RoomId, UserId},
        vote::VoteAction,
    },
};

/// Open a vote after checking the action currently makes sense in the room.
pub async fn propose(
    state: &SharedState,
    room: &RoomId,
    request: ProposeVoteRequest,
) -> Result<VoteSummary, ServiceError> {
    let ProposeVoteRequest {
        requester,
        action,
        eligible_voters,
    } = request;
    let attributes = describe(state.sessions(), room, action).await?;
    let proposal = Proposal {
        room: room.clone(),
        action,
        attributes,
        proposer: UserId::from(requester.id),
        eligible: eligible_voters,
    };
    let settings = &state.config().room(room).voting;
    let apply = apply_action(state.sessions().clone(), room.clone(), action);
    let vote = state.votes().propose(proposal, settings, apply)?;
    Ok(VoteSummary::from(&vote))
}

/// The vote running in `room`.
pub async fn current(state: &SharedState, room: &RoomId) -> Result<VoteSummary, ServiceError> {
    let vote = state.votes().snapshot(room).await?;
    Ok(VoteSummary::from(&vote))
}

/// Count a confirmation; the response carries the action result once applied.
pub async fn confirm(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<ConfirmVoteResponse, ServiceError> {
    let report = state
        .votes()
        .confirm(room, UserId::from(requester.id))
        .await?;
    let (result, error) = match report.application {
        Some(Ok(result)) => (Some(result), None),
        Some(Err(err)) => (None, Some(err.to_string())),
        None => (None, None),
    };
    Ok(ConfirmVoteResponse {
        vote: VoteSummary::from(&report.vote),
        result,
        error,
    })
}

/// Record a rejection of the running vote.
pub async fn reject(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<VoteSummary, ServiceError> {
    let vote = state
        .votes()
        .reject(room, UserId::from(requester.id))
        .await?;
    Ok(VoteSummary::from(&vote))
}

/// Describe what the vote targets, failing when the action cannot apply right now.
async fn describe(
    sessions: &SessionRegistry,
    room: &RoomId,
    action: VoteAction,
) -> Result<Value, ServiceError> {
    let snapshot = sessions.snapshot(room).await?;
    match action {
        VoteAction::Skip => snapshot
            .current
            .map(|track| track.attributes())
            .ok_or(ServiceError::NoActiveTrack),
        VoteAction::SkipTo { position } => {
            let len = snapshot.queue.len();
            position
                .checked_sub(1)
                .and_then(|index| snapshot.queue.get(index))
                .map(|track| track.attributes())
                .ok_or(ServiceError::OutOfRange {
                    value: position as i64,
                    min: 1,
                    max: len as i64,
                })
        }
        VoteAction::Shuffle | VoteAction::ClearQueue => {
            if snapshot.queue.is_empty() {
                return Err(ServiceError::EmptyQueue);
            }
            Ok(json!({ "queue_len": snapshot.queue.len() }))
        }
    }
}

/// Build the deferred command a confirmed vote applies with quorum authority.
pub fn apply_action(sessions: SessionRegistry, room: RoomId, action: VoteAction) -> ApplyFn {
    Box::new(move || {
        async move {
            let authority = Authority::Quorum;
            match action {
                VoteAction::Skip => {
                    let track = sessions.skip(&room, &authority).await?;
                    Ok(json!({ "skipped": track.attributes() }))
                }
                VoteAction::SkipTo { position } => {
                    let track = sessions.skip_to(&room, &authority, position).await?;
                    Ok(json!({ "playing": track.attributes() }))
                }
                VoteAction::Shuffle => {
                    let count = sessions.shuffle(&room).await?;
                    Ok(json!({ "shuffled": count }))
                }
                VoteAction::ClearQueue => {
                    let count = sessions.clear_queue(&room, &authority).await?;
                    Ok(json!({ "cleared": count }))
                }
            }
        }
        .boxed()
    })
}
