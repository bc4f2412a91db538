//! Scoring of locked answers once a question is revealed.

use std::collections::HashMap;

use uuid::Uuid;

use crate::state::voting::LockedAnswer;

/// Outcome of one team for a revealed question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAnswer {
    pub team_id: Uuid,
    /// Locked option, `None` when the team never reached a majority.
    pub option_id: Option<String>,
    pub locked_at_ms: Option<u64>,
    pub correct: bool,
    /// Base points plus any speed bonus.
    pub points_awarded: u32,
}

/// Scored round, ready to be folded into team scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResults {
    pub correct_option_id: String,
    /// One entry per team, in team order.
    pub answers: Vec<TeamAnswer>,
    /// Team that received the speed bonus, if any.
    pub fastest_team_id: Option<Uuid>,
}

impl RoundResults {
    /// Points earned by `team_id` this round.
    pub fn points_for(&self, team_id: &Uuid) -> u32 {
        self.answers
            .iter()
            .find(|answer| answer.team_id == *team_id)
            .map_or(0, |answer| answer.points_awarded)
    }
}

/// Score every team against the correct option.
///
/// Correct teams get `base_points`. When more than one team is correct, the single team
/// that locked first (by timestamp, then by submission sequence) also gets `speed_bonus`.
pub fn score_round(
    team_ids: impl IntoIterator<Item = Uuid>,
    locked: &HashMap<Uuid, LockedAnswer>,
    correct_option_id: &str,
    base_points: u32,
    speed_bonus: u32,
) -> RoundResults {
    let mut answers = team_ids
        .into_iter()
        .map(|team_id| {
            let lock = locked.get(&team_id);
            let correct = lock.is_some_and(|lock| lock.option_id == correct_option_id);
            TeamAnswer {
                team_id,
                option_id: lock.map(|lock| lock.option_id.clone()),
                locked_at_ms: lock.map(|lock| lock.locked_at_ms),
                correct,
                points_awarded: if correct { base_points } else { 0 },
            }
        })
        .collect::<Vec<_>>();

    let correct_locks = answers
        .iter()
        .filter(|answer| answer.correct)
        .filter_map(|answer| locked.get(&answer.team_id).map(|lock| (answer.team_id, lock)))
        .collect::<Vec<_>>();

    let fastest_team_id = if correct_locks.len() > 1 {
        correct_locks
            .iter()
            .min_by_key(|(_, lock)| (lock.locked_at_ms, lock.sequence))
            .map(|(team_id, _)| *team_id)
    } else {
        None
    };

    if let Some(fastest) = fastest_team_id {
        if let Some(answer) = answers.iter_mut().find(|answer| answer.team_id == fastest) {
            answer.points_awarded = answer.points_awarded.saturating_add(speed_bonus);
        }
    }

    RoundResults {
        correct_option_id: correct_option_id.to_owned(),
        answers,
        fastest_team_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(option: &str, at: u64, sequence: u64) -> LockedAnswer {
        LockedAnswer {
            option_id: option.into(),
            locked_at_ms: at,
            sequence,
        }
    }

    #[test]
    fn fastest_correct_team_gets_the_bonus() {
        let (t1, t2, t3, t4) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let locked = HashMap::from([
            (t1, lock("X", 100, 1)),
            (t2, lock("X", 200, 2)),
            (t3, lock("Y", 50, 0)),
        ]);

        let results = score_round([t1, t2, t3, t4], &locked, "X", 10, 5);

        assert_eq!(results.points_for(&t1), 15);
        assert_eq!(results.points_for(&t2), 10);
        assert_eq!(results.points_for(&t3), 0);
        assert_eq!(results.points_for(&t4), 0);
        assert_eq!(results.fastest_team_id, Some(t1));
        assert_eq!(results.answers[3].option_id, None);
        assert!(!results.answers[2].correct);
    }

    #[test]
    fn lone_correct_team_gets_no_bonus() {
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let locked = HashMap::from([(t1, lock("X", 100, 0)), (t2, lock("Y", 90, 1))]);

        let results = score_round([t1, t2], &locked, "X", 10, 5);
        assert_eq!(results.points_for(&t1), 10);
        assert_eq!(results.fastest_team_id, None);
    }

    #[test]
    fn same_millisecond_locks_fall_back_to_sequence() {
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let locked = HashMap::from([(t1, lock("X", 100, 7)), (t2, lock("X", 100, 3))]);

        let results = score_round([t1, t2], &locked, "X", 10, 5);
        assert_eq!(results.fastest_team_id, Some(t2));
        assert_eq!(results.points_for(&t2), 15);
        assert_eq!(results.points_for(&t1), 10);
    }

    #[test]
    fn speed_bonus_saturates_on_huge_points() {
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let locked = HashMap::from([(t1, lock("X", 1, 0)), (t2, lock("X", 2, 1))]);

        let results = score_round([t1, t2], &locked, "X", u32::MAX - 1, 5);
        assert_eq!(results.points_for(&t1), u32::MAX);
        assert_eq!(results.points_for(&t2), u32::MAX - 1);
    }
}
