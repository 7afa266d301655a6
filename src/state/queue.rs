use std::collections::VecDeque;

use rand::{rng, seq::SliceRandom};

use crate::{error::ServiceError, state::track::Track};

/// Ordered list of pending tracks for one room; the head plays next.
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
}

impl TrackQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the tail, returning its 1-based position.
    pub fn enqueue(&mut self, track: Track) -> usize {
        self.tracks.push_back(track);
        self.tracks.len()
    }

    /// Remove and return the head, or `None` when nothing is pending.
    pub fn dequeue_next(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Reorder the pending tracks into a uniformly random permutation.
    pub fn shuffle(&mut self) {
        if self.tracks.len() > 1 {
            let mut rng = rng();
            self.tracks.make_contiguous().shuffle(&mut rng);
        }
    }

    /// Borrow the track at a 1-based position.
    pub fn get(&self, position: usize) -> Result<&Track, ServiceError> {
        self.check_position(position)?;
        self.tracks
            .get(position - 1)
            .ok_or_else(|| self.out_of_range(position))
    }

    /// Remove the track at a 1-based position.
    pub fn remove_at(&mut self, position: usize) -> Result<Track, ServiceError> {
        self.check_position(position)?;
        self.tracks
            .remove(position - 1)
            .ok_or_else(|| self.out_of_range(position))
    }

    /// Drop every track ahead of `position` and return the one at `position`.
    pub fn skip_to(&mut self, position: usize) -> Result<Track, ServiceError> {
        self.check_position(position)?;
        self.tracks.drain(..position - 1);
        self.tracks
            .pop_front()
            .ok_or_else(|| self.out_of_range(position))
    }

    /// Remove every pending track, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.tracks.len();
        self.tracks.clear();
        count
    }

    /// Number of pending tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Owned copy of the pending tracks in play order.
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    fn check_position(&self, position: usize) -> Result<(), ServiceError> {
        if position < 1 || position > self.tracks.len() {
            return Err(self.out_of_range(position));
        }
        Ok(())
    }

    fn out_of_range(&self, position: usize) -> ServiceError {
        ServiceError::OutOfRange {
            value: position as i64,
            min: 1,
            max: self.tracks.len() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::track::UserId;

    fn track(title: &str) -> Track {
        Track::new(format!("uri:{title}"), title, 1_000, None, UserId::from("alice"))
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|t| t.title).collect()
    }

    #[test]
    fn dequeue_preserves_fifo_order() {
        let mut queue = TrackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        let played: Vec<String> = std::iter::from_fn(|| queue.dequeue_next())
            .map(|t| t.title)
            .collect();
        assert_eq!(played, vec!["a", "b", "c"]);
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn enqueue_reports_one_based_position() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.enqueue(track("a")), 1);
        assert_eq!(queue.enqueue(track("b")), 2);
    }

    #[test]
    fn shuffle_keeps_the_same_tracks() {
        let mut queue = TrackQueue::new();
        let enqueued: Vec<Track> = (0..20).map(|i| track(&i.to_string())).collect();
        for t in &enqueued {
            queue.enqueue(t.clone());
        }

        queue.shuffle();

        let mut after: Vec<_> = queue.snapshot().into_iter().map(|t| t.id).collect();
        let mut before: Vec<_> = enqueued.iter().map(|t| t.id).collect();
        after.sort();
        before.sort();
        assert_eq!(after, before);
    }

    #[test]
    fn remove_at_rejects_positions_outside_queue() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        assert_eq!(
            queue.remove_at(0).unwrap_err(),
            ServiceError::OutOfRange {
                value: 0,
                min: 1,
                max: 2
            }
        );
        assert!(matches!(
            queue.remove_at(3),
            Err(ServiceError::OutOfRange { value: 3, .. })
        ));

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title, "b");
        assert_eq!(titles(&queue), vec!["a"]);
    }

    #[test]
    fn skip_to_drops_preceding_tracks() {
        let mut queue = TrackQueue::new();
        for title in ["a", "b", "c", "d"] {
            queue.enqueue(track(title));
        }

        let next = queue.skip_to(3).unwrap();
        assert_eq!(next.title, "c");
        assert_eq!(titles(&queue), vec!["d"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        let snapshot = queue.snapshot();

        queue.enqueue(track("b"));
        queue.dequeue_next();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "a");
    }
}
