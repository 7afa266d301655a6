//! One-shot group vote deciding whether a contested action is applied.

use std::time::SystemTime;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::track::{RoomId, UserId};

/// Resolution state of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Still accepting votes.
    Collecting,
    /// Quorum of confirmations reached; the action was applied.
    Applied,
    /// Quorum of rejections reached.
    Rejected,
    /// Deadline passed before any quorum.
    TimedOut,
}

impl VoteOutcome {
    /// Whether the vote is settled.
    pub fn is_terminal(self) -> bool {
        self != VoteOutcome::Collecting
    }
}

/// Action a vote applies once confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteAction {
    /// Skip the current track.
    Skip,
    /// Shuffle the queue.
    Shuffle,
    /// Jump to a queue position.
    SkipTo {
        /// 1-based queue position.
        position: usize,
    },
    /// Drop every pending track.
    ClearQueue,
}

impl VoteAction {
    /// Stable name used in logs and announcements.
    pub fn label(&self) -> &'static str {
        match self {
            VoteAction::Skip => "skip",
            VoteAction::Shuffle => "shuffle",
            VoteAction::SkipTo { .. } => "skip_to",
            VoteAction::ClearQueue => "clear_queue",
        }
    }
}

/// Errors raised by a vote interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The participant already voted.
    #[error("participant already voted")]
    DuplicateVote,
    /// The vote already reached a terminal outcome.
    #[error("vote is closed")]
    Closed,
}

/// Tally after a vote was cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    /// No quorum yet.
    Pending {
        /// Distinct confirmations so far.
        confirmations: usize,
        /// Distinct rejections so far.
        rejections: usize,
        /// Votes needed on either side.
        quorum: usize,
    },
    /// The vote just reached a terminal outcome.
    Resolved(VoteOutcome),
}

/// Votes needed out of `eligible` voters: `max(1, ceil(eligible * ratio))`.
pub fn quorum_for(eligible: usize, ratio: f64) -> usize {
    let needed = (eligible as f64 * ratio).ceil() as usize;
    needed.clamp(1, eligible.max(1))
}

/// State of one vote; the action itself is held by the sequencer.
#[derive(Debug, Clone)]
pub struct VoteSession {
    id: Uuid,
    room: RoomId,
    action: VoteAction,
    attributes: Value,
    proposer: UserId,
    quorum: usize,
    confirmations: IndexSet<UserId>,
    rejections: IndexSet<UserId>,
    deadline: SystemTime,
    outcome: VoteOutcome,
}

impl VoteSession {
    /// Open a vote among `eligible` voters.
    pub fn new(
        room: RoomId,
        action: VoteAction,
        attributes: Value,
        proposer: UserId,
        eligible: usize,
        ratio: f64,
        deadline: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room,
            action,
            attributes,
            proposer,
            quorum: quorum_for(eligible, ratio),
            confirmations: IndexSet::new(),
            rejections: IndexSet::new(),
            deadline,
            outcome: VoteOutcome::Collecting,
        }
    }

    /// Unique vote identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Room the vote runs in.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Action applied once the vote passes.
    pub fn action(&self) -> VoteAction {
        self.action
    }

    /// Display attributes describing what is voted on.
    pub fn attributes(&self) -> &Value {
        &self.attributes
    }

    /// Member who proposed the vote.
    pub fn proposer(&self) -> &UserId {
        &self.proposer
    }

    /// Confirmations needed to pass.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Instant the vote times out.
    pub fn deadline(&self) -> SystemTime {
        self.deadline
    }

    /// Current outcome.
    pub fn outcome(&self) -> VoteOutcome {
        self.outcome
    }

    /// Confirming voters in the order they voted.
    pub fn confirmations(&self) -> impl Iterator<Item = &UserId> {
        self.confirmations.iter()
    }

    /// Confirmations collected so far.
    pub fn confirmation_count(&self) -> usize {
        self.confirmations.len()
    }

    /// Rejections collected so far.
    pub fn rejection_count(&self) -> usize {
        self.rejections.len()
    }

    /// Record a confirmation; reaching the quorum resolves the vote as applied.
    pub fn confirm(&mut self, voter: UserId) -> Result<Tally, VoteError> {
        self.cast(voter, true)
    }

    /// Record a rejection; reaching the quorum resolves the vote as rejected.
    pub fn reject(&mut self, voter: UserId) -> Result<Tally, VoteError> {
        self.cast(voter, false)
    }

    /// Resolve as timed out if still collecting.
    pub fn expire(&mut self) -> Result<(), VoteError> {
        self.ensure_open()?;
        self.outcome = VoteOutcome::TimedOut;
        Ok(())
    }

    fn cast(&mut self, voter: UserId, confirm: bool) -> Result<Tally, VoteError> {
        self.ensure_open()?;
        if self.confirmations.contains(&voter) || self.rejections.contains(&voter) {
            return Err(VoteError::DuplicateVote);
        }

        if confirm {
            self.confirmations.insert(voter);
            if self.confirmations.len() >= self.quorum {
                self.outcome = VoteOutcome::Applied;
            }
        } else {
            self.rejections.insert(voter);
            if self.rejections.len() >= self.quorum {
                self.outcome = VoteOutcome::Rejected;
            }
        }

        if self.outcome.is_terminal() {
            return Ok(Tally::Resolved(self.outcome));
        }
        Ok(Tally::Pending {
            confirmations: self.confirmations.len(),
            rejections: self.rejections.len(),
            quorum: self.quorum,
        })
    }

    fn ensure_open(&self) -> Result<(), VoteError> {
        if self.outcome.is_terminal() {
            return Err(VoteError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vote(eligible: usize) -> VoteSession {
        VoteSession::new(
            RoomId::from("guild-1"),
            VoteAction::Skip,
            json!({}),
            UserId::from("alice"),
            eligible,
            0.5,
            SystemTime::now(),
        )
    }

    #[test]
    fn quorum_rounds_up_and_never_drops_below_one() {
        assert_eq!(quorum_for(0, 0.5), 1);
        assert_eq!(quorum_for(1, 0.5), 1);
        assert_eq!(quorum_for(3, 0.5), 2);
        assert_eq!(quorum_for(4, 0.5), 2);
        assert_eq!(quorum_for(5, 0.5), 3);
        assert_eq!(quorum_for(4, 1.0), 4);
    }

    #[test]
    fn second_distinct_confirmation_of_four_applies() {
        let mut vote = vote(4);

        assert_eq!(
            vote.confirm(UserId::from("a")),
            Ok(Tally::Pending {
                confirmations: 1,
                rejections: 0,
                quorum: 2
            })
        );
        assert_eq!(
            vote.confirm(UserId::from("a")),
            Err(VoteError::DuplicateVote)
        );
        assert_eq!(
            vote.confirm(UserId::from("b")),
            Ok(Tally::Resolved(VoteOutcome::Applied))
        );
        assert_eq!(vote.confirm(UserId::from("c")), Err(VoteError::Closed));
        assert_eq!(vote.confirmation_count(), 2);
    }

    #[test]
    fn lone_voter_resolves_immediately() {
        let mut vote = vote(1);
        assert_eq!(
            vote.confirm(UserId::from("a")),
            Ok(Tally::Resolved(VoteOutcome::Applied))
        );
    }

    #[test]
    fn rejections_reaching_quorum_veto() {
        let mut vote = vote(4);
        vote.confirm(UserId::from("a")).unwrap();
        vote.reject(UserId::from("b")).unwrap();
        assert_eq!(vote.reject(UserId::from("a")), Err(VoteError::DuplicateVote));
        assert_eq!(
            vote.reject(UserId::from("c")),
            Ok(Tally::Resolved(VoteOutcome::Rejected))
        );
    }

    #[test]
    fn expiry_only_applies_to_open_votes() {
        let mut open = vote(4);
        assert_eq!(open.expire(), Ok(()));
        assert_eq!(open.outcome(), VoteOutcome::TimedOut);
        assert_eq!(open.expire(), Err(VoteError::Closed));

        let mut applied = vote(1);
        applied.confirm(UserId::from("a")).unwrap();
        assert_eq!(applied.expire(), Err(VoteError::Closed));
        assert_eq!(applied.outcome(), VoteOutcome::Applied);
    }
}
