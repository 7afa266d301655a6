use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::VotingSettings,
    error::ServiceError,
    state::{
        notify::{
            NotificationSink, VOTE_APPLIED, VOTE_FAILED, VOTE_PROGRESS, VOTE_REJECTED,
            VOTE_STARTED, VOTE_TIMED_OUT,
        },
        track::{RoomId, UserId},
        vote::{Tally, VoteAction, VoteOutcome, VoteSession},
    },
};

/// Future produced by a vote's action; resolves to announcement attributes.
pub type ApplyFuture = BoxFuture<'static, Result<Value, ServiceError>>;
/// Deferred action applied when a vote reaches its quorum.
pub type ApplyFn = Box<dyn FnOnce() -> ApplyFuture + Send>;

/// Parameters of a new vote.
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Room the vote runs in.
    pub room: RoomId,
    /// What is voted on.
    pub action: VoteAction,
    /// Display attributes describing the action.
    pub attributes: Value,
    /// Member who opened the vote.
    pub proposer: UserId,
    /// Number of members allowed to vote.
    pub eligible: usize,
}

/// Result of a confirmation.
#[derive(Debug)]
pub struct VoteReport {
    /// Vote state after the confirmation.
    pub vote: VoteSession,
    /// Outcome of the action when this confirmation reached the quorum.
    pub application: Option<Result<Value, ServiceError>>,
}

struct ActiveVote {
    state: Mutex<VoteState>,
}

struct VoteState {
    session: VoteSession,
    apply: Option<ApplyFn>,
    deadline_task: Option<JoinHandle<()>>,
}

impl VoteState {
    /// Stop the deadline timer and hand out the action, at most once.
    fn close(&mut self) -> Option<ApplyFn> {
        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
        self.apply.take()
    }
}

/// Runs at most one vote per room and applies confirmed actions exactly once.
#[derive(Clone)]
pub struct VotingSequencer {
    inner: Arc<SequencerInner>,
}

struct SequencerInner {
    votes: DashMap<RoomId, Arc<ActiveVote>>,
    sink: Arc<dyn NotificationSink>,
}

impl VotingSequencer {
    /// Sequencer with no running vote, announcing through `sink`.
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            inner: Arc::new(SequencerInner {
                votes: DashMap::new(),
                sink,
            }),
        }
    }

    /// Number of votes currently collecting.
    pub fn active_count(&self) -> usize {
        self.inner.votes.len()
    }

    /// Current state of the room's vote.
    pub async fn snapshot(&self, room: &RoomId) -> Result<VoteSession, ServiceError> {
        let vote = self.active(room)?;
        let state = vote.state.lock().await;
        Ok(state.session.clone())
    }

    /// Open a vote; `apply` runs once the confirmations reach the quorum.
    pub fn propose(
        &self,
        proposal: Proposal,
        settings: &VotingSettings,
        apply: ApplyFn,
    ) -> Result<VoteSession, ServiceError> {
        if !settings.enabled {
            return Err(ServiceError::VotingDisabled);
        }

        let Proposal {
            room,
            action,
            attributes,
            proposer,
            eligible,
        } = proposal;
        let session = VoteSession::new(
            room.clone(),
            action,
            attributes,
            proposer,
            eligible,
            settings.ratio,
            SystemTime::now() + settings.max_duration,
        );

        match self.inner.votes.entry(room.clone()) {
            Entry::Occupied(_) => return Err(ServiceError::VoteInProgress),
            Entry::Vacant(slot) => {
                let task = self.spawn_deadline(room.clone(), session.id(), settings.max_duration);
                slot.insert(Arc::new(ActiveVote {
                    state: Mutex::new(VoteState {
                        session: session.clone(),
                        apply: Some(apply),
                        deadline_task: Some(task),
                    }),
                }));
            }
        }

        info!(
            room = %room,
            vote_id = %session.id(),
            action = action.label(),
            proposer = %session.proposer(),
            quorum = session.quorum(),
            "vote started"
        );
        let mut attributes = describe(&session);
        attributes["eligible"] = json!(eligible);
        attributes["timeout_secs"] = json!(settings.max_duration.as_secs());
        self.inner.sink.announce(&room, VOTE_STARTED, attributes);
        Ok(session)
    }

    /// Count a confirmation, applying the action when it completes the quorum.
    pub async fn confirm(&self, room: &RoomId, voter: UserId) -> Result<VoteReport, ServiceError> {
        let vote = self.active(room)?;
        let mut state = vote.state.lock().await;
        let tally = state.session.confirm(voter.clone())?;

        if let Tally::Pending {
            confirmations,
            quorum,
            ..
        } = tally
        {
            debug!(room = %room, %voter, confirmations, quorum, "vote confirmed");
            self.inner
                .sink
                .announce(room, VOTE_PROGRESS, describe(&state.session));
            return Ok(VoteReport {
                vote: state.session.clone(),
                application: None,
            });
        }

        let apply = state.close();
        let session = state.session.clone();
        drop(state);
        self.retire(room, &vote);

        let application = match apply {
            Some(apply) => Some(self.run_apply(&session, apply).await),
            None => None,
        };
        Ok(VoteReport {
            vote: session,
            application,
        })
    }

    /// Count a rejection, vetoing the vote when rejections reach the quorum.
    pub async fn reject(&self, room: &RoomId, voter: UserId) -> Result<VoteSession, ServiceError> {
        let vote = self.active(room)?;
        let mut state = vote.state.lock().await;
        let tally = state.session.reject(voter.clone())?;

        if let Tally::Pending { rejections, .. } = tally {
            debug!(room = %room, %voter, rejections, "vote rejected by participant");
            self.inner
                .sink
                .announce(room, VOTE_PROGRESS, describe(&state.session));
            return Ok(state.session.clone());
        }

        state.close();
        let session = state.session.clone();
        drop(state);
        self.retire(room, &vote);

        info!(room = %room, vote_id = %session.id(), action = session.action().label(), "vote rejected");
        self.inner
            .sink
            .announce(room, VOTE_REJECTED, describe(&session));
        Ok(session)
    }

    fn active(&self, room: &RoomId) -> Result<Arc<ActiveVote>, ServiceError> {
        self.inner
            .votes
            .get(room)
            .map(|entry| entry.value().clone())
            .ok_or(ServiceError::NoActiveVote)
    }

    fn retire(&self, room: &RoomId, vote: &Arc<ActiveVote>) {
        self.inner
            .votes
            .remove_if(room, |_, existing| Arc::ptr_eq(existing, vote));
    }

    fn spawn_deadline(&self, room: RoomId, vote_id: Uuid, after: Duration) -> JoinHandle<()> {
        let sequencer = self.clone();
        tokio::spawn(async move {
            sleep(after).await;
            sequencer.expire(&room, vote_id).await;
        })
    }

    async fn expire(&self, room: &RoomId, vote_id: Uuid) {
        let Ok(vote) = self.active(room) else {
            return;
        };
        let mut state = vote.state.lock().await;
        if state.session.id() != vote_id || state.session.expire().is_err() {
            debug!(room = %room, %vote_id, "deadline fired for a resolved vote");
            return;
        }

        // running inside the deadline task itself
        state.deadline_task.take();
        state.apply.take();
        let session = state.session.clone();
        drop(state);
        self.retire(room, &vote);

        info!(
            room = %room,
            %vote_id,
            action = session.action().label(),
            confirmations = session.confirmation_count(),
            quorum = session.quorum(),
            "vote timed out"
        );
        self.inner
            .sink
            .announce(room, VOTE_TIMED_OUT, describe(&session));
    }

    async fn run_apply(&self, session: &VoteSession, apply: ApplyFn) -> Result<Value, ServiceError> {
        debug_assert_eq!(session.outcome(), VoteOutcome::Applied);
        let room = session.room();
        match apply().await {
            Ok(result) => {
                info!(room = %room, vote_id = %session.id(), action = session.action().label(), "vote applied");
                let mut attributes = describe(session);
                attributes["result"] = result.clone();
                self.inner.sink.announce(room, VOTE_APPLIED, attributes);
                Ok(result)
            }
            Err(err) => {
                warn!(room = %room, vote_id = %session.id(), error = %err, "voted action failed");
                let mut attributes = describe(session);
                attributes["error"] = json!(err.to_string());
                self.inner.sink.announce(room, VOTE_FAILED, attributes);
                Err(err)
            }
        }
    }
}

fn describe(session: &VoteSession) -> Value {
    json!({
        "vote_id": session.id(),
        "action": session.action(),
        "subject": session.attributes(),
        "proposer": session.proposer(),
        "confirmations": session.confirmation_count(),
        "rejections": session.rejection_count(),
        "quorum": session.quorum(),
    })
}
