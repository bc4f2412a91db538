//! Per-team vote aggregation and majority locking.
//!
//! Every team keeps the current vote of each member plus an append-only log of every
//! submission. A team locks as soon as one option holds a strict majority of the votes cast.
//! Members who stay silent never block a lock, but a team with two or more members needs at
//! least two votes before it can lock. Once locked, a team's answer never changes for the
//! lifetime of the question; later votes are logged and otherwise ignored.

use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

/// Immutable team answer for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedAnswer {
    /// Option the team settled on.
    pub option_id: String,
    /// Wall-clock time of the lock, in milliseconds since the Unix epoch.
    pub locked_at_ms: u64,
    /// Room-wide submission sequence at lock time, used to order locks within one millisecond.
    pub sequence: u64,
}

/// One submission, kept for record-keeping even when it arrives after the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub member_id: Uuid,
    pub option_id: String,
    pub sequence: u64,
    pub at_ms: u64,
    pub after_lock: bool,
}

/// Vote count for one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionCount {
    pub option_id: String,
    pub votes: usize,
}

/// Current standing of a team's ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Counts ordered from most to least voted, ties broken by first mover.
    pub counts: Vec<OptionCount>,
    /// Number of members holding a current vote.
    pub voters: usize,
    /// Option currently ahead, if anyone voted.
    pub leader: Option<String>,
}

/// What a single vote did to the team's ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote recorded, no majority yet.
    Pending(Tally),
    /// Vote recorded and the team locked.
    Locked(LockedAnswer, Tally),
    /// The team had already locked; the vote was only logged.
    AlreadyLocked(LockedAnswer),
}

#[derive(Debug, Clone)]
struct CurrentVote {
    option_id: String,
    sequence: u64,
}

/// Ballot of one team for the current question.
#[derive(Debug, Clone, Default)]
pub struct TeamBallot {
    current: IndexMap<Uuid, CurrentVote>,
    log: Vec<VoteRecord>,
    locked: Option<LockedAnswer>,
}

impl TeamBallot {
    pub fn locked(&self) -> Option<&LockedAnswer> {
        self.locked.as_ref()
    }

    /// Every submission in arrival order.
    pub fn log(&self) -> &[VoteRecord] {
        &self.log
    }

    /// Count current votes per option.
    pub fn tally(&self) -> Tally {
        // option -> (votes, earliest sequence among its current voters)
        let mut counts: IndexMap<&str, (usize, u64)> = IndexMap::new();
        for vote in self.current.values() {
            let entry = counts
                .entry(vote.option_id.as_str())
                .or_insert((0, vote.sequence));
            entry.0 += 1;
            entry.1 = entry.1.min(vote.sequence);
        }

        let mut ranked = counts.into_iter().collect::<Vec<_>>();
        ranked.sort_by(|(_, (a_votes, a_seq)), (_, (b_votes, b_seq))| {
            b_votes.cmp(a_votes).then(a_seq.cmp(b_seq))
        });

        Tally {
            leader: ranked.first().map(|(option, _)| (*option).to_owned()),
            counts: ranked
                .into_iter()
                .map(|(option_id, (votes, _))| OptionCount {
                    option_id: option_id.to_owned(),
                    votes,
                })
                .collect(),
            voters: self.current.len(),
        }
    }

    fn try_lock(&mut self, tally: &Tally, roster_size: usize, now_ms: u64, sequence: u64) -> bool {
        let (Some(leader), Some(top)) = (tally.leader.as_ref(), tally.counts.first()) else {
            return false;
        };
        // a one-member (or emptied) team may lock on a single vote
        let quorum = roster_size.clamp(1, 2);
        if tally.voters < quorum || top.votes * 2 <= tally.voters {
            return false;
        }

        self.locked = Some(LockedAnswer {
            option_id: leader.clone(),
            locked_at_ms: now_ms,
            sequence,
        });
        true
    }
}

/// Ballots of every team for the current question.
///
/// Replaced wholesale whenever a new question loads.
#[derive(Debug, Clone, Default)]
pub struct Ballots {
    next_sequence: u64,
    teams: HashMap<Uuid, TeamBallot>,
}

impl Ballots {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Record `member_id`'s vote for `option_id` and lock the team if a majority formed.
    ///
    /// A member voting again replaces their previous vote; the option keeps the
    /// sequence of the newest submission.
    pub fn cast(
        &mut self,
        team_id: Uuid,
        member_id: Uuid,
        option_id: &str,
        roster_size: usize,
        now_ms: u64,
    ) -> VoteOutcome {
        let sequence = self.allocate_sequence();
        let ballot = self.teams.entry(team_id).or_default();

        let after_lock = ballot.locked.is_some();
        ballot.log.push(VoteRecord {
            member_id,
            option_id: option_id.to_owned(),
            sequence,
            at_ms: now_ms,
            after_lock,
        });

        if let Some(locked) = ballot.locked.as_ref() {
            return VoteOutcome::AlreadyLocked(locked.clone());
        }

        // Re-insert so a changed vote moves to the back in submission order.
        ballot.current.shift_remove(&member_id);
        ballot.current.insert(
            member_id,
            CurrentVote {
                option_id: option_id.to_owned(),
                sequence,
            },
        );

        let tally = ballot.tally();
        if ballot.try_lock(&tally, roster_size, now_ms, sequence) {
            if let Some(locked) = ballot.locked.clone() {
                return VoteOutcome::Locked(locked, tally);
            }
        }
        VoteOutcome::Pending(tally)
    }

    /// Re-run the majority check for an unlocked team after its roster changed.
    ///
    /// Returns the new lock when the smaller roster lets the current votes win.
    pub fn reevaluate(
        &mut self,
        team_id: Uuid,
        roster_size: usize,
        now_ms: u64,
    ) -> Option<LockedAnswer> {
        let sequence = self.next_sequence;
        let ballot = self.teams.get_mut(&team_id)?;
        if ballot.locked.is_some() {
            return None;
        }

        let tally = ballot.tally();
        if !ballot.try_lock(&tally, roster_size, now_ms, sequence) {
            return None;
        }
        self.next_sequence += 1;
        ballot.locked.clone()
    }

    pub fn ballot(&self, team_id: &Uuid) -> Option<&TeamBallot> {
        self.teams.get(team_id)
    }

    /// Locked answers keyed by team.
    pub fn locked_answers(&self) -> HashMap<Uuid, LockedAnswer> {
        self.teams
            .iter()
            .filter_map(|(team_id, ballot)| ballot.locked.clone().map(|lock| (*team_id, lock)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(count: usize) -> Vec<Uuid> {
        (0..count).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn three_member_team_locks_on_the_third_vote() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(3);

        assert!(matches!(
            ballots.cast(team, m[0], "optA", 3, 100),
            VoteOutcome::Pending(_)
        ));
        assert!(matches!(
            ballots.cast(team, m[1], "optB", 3, 200),
            VoteOutcome::Pending(_)
        ));

        match ballots.cast(team, m[2], "optA", 3, 300) {
            VoteOutcome::Locked(lock, tally) => {
                assert_eq!(lock.option_id, "optA");
                assert_eq!(lock.locked_at_ms, 300);
                assert_eq!(tally.voters, 3);
                assert_eq!(tally.counts[0].votes, 2);
            }
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[test]
    fn even_split_does_not_lock_until_broken() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(3);

        assert!(matches!(
            ballots.cast(team, m[0], "opt1", 2, 1),
            VoteOutcome::Pending(_)
        ));
        match ballots.cast(team, m[1], "opt2", 2, 2) {
            VoteOutcome::Pending(tally) => {
                // first mover leads the tie
                assert_eq!(tally.leader.as_deref(), Some("opt1"));
            }
            other => panic!("1-1 split must not lock, got {other:?}"),
        }

        match ballots.cast(team, m[2], "opt1", 2, 3) {
            VoteOutcome::Locked(lock, _) => assert_eq!(lock.option_id, "opt1"),
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[test]
    fn votes_after_lock_are_logged_but_ignored() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(2);

        ballots.cast(team, m[0], "a", 1, 10);
        let outcome = ballots.cast(team, m[1], "b", 1, 20);
        assert!(matches!(
            outcome,
            VoteOutcome::AlreadyLocked(ref lock) if lock.option_id == "a"
        ));
        let outcome = ballots.cast(team, m[0], "b", 1, 30);
        assert!(matches!(outcome, VoteOutcome::AlreadyLocked(_)));

        let ballot = ballots.ballot(&team).unwrap();
        assert_eq!(ballot.locked().unwrap().option_id, "a");
        assert_eq!(ballot.log().len(), 3);
        assert!(ballot.log()[1].after_lock);
        assert!(!ballot.log()[0].after_lock);
    }

    #[test]
    fn member_can_change_vote_before_lock() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(4);

        ballots.cast(team, m[0], "a", 4, 1);
        ballots.cast(team, m[1], "b", 4, 2);
        ballots.cast(team, m[2], "c", 4, 3);
        let tally = ballots.ballot(&team).unwrap().tally();
        assert_eq!(tally.voters, 3);
        assert_eq!(tally.leader.as_deref(), Some("a"));

        match ballots.cast(team, m[0], "b", 4, 4) {
            VoteOutcome::Locked(lock, tally) => {
                assert_eq!(lock.option_id, "b");
                assert_eq!(tally.voters, 3);
                assert_eq!(
                    tally.counts[0],
                    OptionCount {
                        option_id: "b".into(),
                        votes: 2
                    }
                );
            }
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[test]
    fn silent_members_do_not_block_a_lock() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(4);

        assert!(matches!(
            ballots.cast(team, m[0], "a", 4, 1),
            VoteOutcome::Pending(_)
        ));
        match ballots.cast(team, m[1], "a", 4, 2) {
            VoteOutcome::Locked(lock, tally) => {
                assert_eq!(lock.option_id, "a");
                assert_eq!(tally.voters, 2);
            }
            other => panic!("two unanimous votes must lock, got {other:?}"),
        }
    }

    #[test]
    fn tie_leader_is_the_option_voted_first() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(4);

        ballots.cast(team, m[0], "x", 8, 1);
        ballots.cast(team, m[1], "y", 8, 2);
        ballots.cast(team, m[2], "z", 8, 3);
        ballots.cast(team, m[3], "w", 8, 4);
        let tally = ballots.ballot(&team).unwrap().tally();
        assert_eq!(tally.voters, 4);
        assert_eq!(tally.leader.as_deref(), Some("x"));
        assert!(ballots.locked_answers().is_empty());
    }

    #[test]
    fn shrinking_roster_can_complete_a_majority() {
        let mut ballots = Ballots::new();
        let team = Uuid::new_v4();
        let m = members(2);

        // a lone vote in a two-member team waits for a second voice
        assert!(matches!(
            ballots.cast(team, m[0], "a", 2, 1),
            VoteOutcome::Pending(_)
        ));
        assert!(ballots.reevaluate(team, 2, 2).is_none());

        let lock = ballots.reevaluate(team, 1, 3).unwrap();
        assert_eq!(lock.option_id, "a");
        assert_eq!(lock.locked_at_ms, 3);
        assert!(ballots.reevaluate(team, 1, 4).is_none());
        assert_eq!(ballots.locked_answers().len(), 1);
    }

    #[test]
    fn lock_sequence_orders_same_millisecond_locks() {
        let mut ballots = Ballots::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let m = members(2);

        let VoteOutcome::Locked(first, _) = ballots.cast(t1, m[0], "a", 1, 50) else {
            panic!("expected lock");
        };
        let VoteOutcome::Locked(second, _) = ballots.cast(t2, m[1], "a", 1, 50) else {
            panic!("expected lock");
        };
        assert!(first.sequence < second.sequence);
    }
}
