use thiserror::Error;
use time::OffsetDateTime;

use crate::dao::models::{GameStatus, GameStatusPatch};

/// Events that can move a game forward in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The participant count reached the lobby capacity.
    CapacityReached,
    /// The host started the game before the lobby filled up.
    ManualStart,
    /// The last question was closed and rankings were frozen.
    LastQuestionClosed,
}

/// Error returned when an event cannot be applied from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the game was in when the event was received.
    pub from: GameStatus,
    /// The rejected event.
    pub event: LifecycleEvent,
}

/// A validated transition, written with a conditional update on `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Status the update expects to find.
    pub from: GameStatus,
    /// Status after the update.
    pub to: GameStatus,
    /// Event that triggered the transition.
    pub event: LifecycleEvent,
}

impl Plan {
    /// Fields to write, stamping `started_at` or `ended_at` as the target requires.
    pub fn patch(&self, now: OffsetDateTime) -> GameStatusPatch {
        GameStatusPatch {
            status: self.to,
            started_at: (self.to == GameStatus::Active).then_some(now),
            ended_at: (self.to == GameStatus::Finished).then_some(now),
            updated_at: now,
        }
    }
}

/// Compute the transition for `event` from `from`, rejecting skips and regressions.
pub fn compute_transition(
    from: GameStatus,
    event: LifecycleEvent,
) -> Result<Plan, InvalidTransition> {
    let to = match (from, event) {
        (GameStatus::Pending, LifecycleEvent::CapacityReached | LifecycleEvent::ManualStart) => {
            GameStatus::Active
        }
        (GameStatus::Active, LifecycleEvent::LastQuestionClosed) => GameStatus::Finished,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(Plan { from, to, event })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_goes_pending_active_finished() {
        let start = compute_transition(GameStatus::Pending, LifecycleEvent::CapacityReached).unwrap();
        assert_eq!(start.to, GameStatus::Active);

        let finish = compute_transition(start.to, LifecycleEvent::LastQuestionClosed).unwrap();
        assert_eq!(finish.to, GameStatus::Finished);
    }

    #[test]
    fn pending_cannot_skip_to_finished() {
        let err = compute_transition(GameStatus::Pending, LifecycleEvent::LastQuestionClosed)
            .unwrap_err();
        assert_eq!(err.from, GameStatus::Pending);
        assert_eq!(err.event, LifecycleEvent::LastQuestionClosed);
    }

    #[test]
    fn finished_is_terminal() {
        for event in [
            LifecycleEvent::CapacityReached,
            LifecycleEvent::ManualStart,
            LifecycleEvent::LastQuestionClosed,
        ] {
            assert!(compute_transition(GameStatus::Finished, event).is_err());
        }
    }

    #[test]
    fn active_cannot_restart() {
        assert!(compute_transition(GameStatus::Active, LifecycleEvent::ManualStart).is_err());
        assert!(compute_transition(GameStatus::Active, LifecycleEvent::CapacityReached).is_err());
    }

    #[test]
    fn patch_stamps_the_matching_timestamp() {
        let now = OffsetDateTime::now_utc();
        let start = compute_transition(GameStatus::Pending, LifecycleEvent::ManualStart)
            .unwrap()
            .patch(now);
        assert_eq!(start.started_at, Some(now));
        assert_eq!(start.ended_at, None);

        let finish = compute_transition(GameStatus::Active, LifecycleEvent::LastQuestionClosed)
            .unwrap()
            .patch(now);
        assert_eq!(finish.started_at, None);
        assert_eq!(finish.ended_at, Some(now));
    }
}
