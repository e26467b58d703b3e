// In-memory standup storage, bucketed by team key.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::standup::{display_team_name, SpeakerTurn, Standup, TeamSummary};

/// Standups for one team, newest first.
#[derive(Debug, Clone)]
struct TeamBucket {
    key: String,
    standups: Vec<Standup>,
}

/// Process-lifetime standup storage.
///
/// Team buckets keep their insertion order so the team listing is stable.
/// Standups are only ever prepended; there is no update or delete path.
#[derive(Debug, Default)]
pub struct StandupStore {
    teams: RwLock<Vec<TeamBucket>>,
}

impl StandupStore {
    /// An empty store with no teams.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the demo teams and one sample standup.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut teams = store.write();
            teams.push(TeamBucket {
                key: "development".into(),
                standups: vec![sample_standup()],
            });
            for key in ["qa-automation", "ui", "devops"] {
                teams.push(TeamBucket {
                    key: key.into(),
                    standups: Vec::new(),
                });
            }
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<TeamBucket>> {
        self.teams.read().expect("standup store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<TeamBucket>> {
        self.teams.write().expect("standup store lock poisoned")
    }

    /// All teams with their display names and meeting counts.
    pub fn list_teams(&self) -> Vec<TeamSummary> {
        self.read()
            .iter()
            .map(|bucket| TeamSummary {
                name: display_team_name(&bucket.key),
                path: bucket.key.clone(),
                meeting_count: bucket.standups.len(),
            })
            .collect()
    }

    /// Standups for `team_key`, newest first. Unknown teams have no history.
    pub fn team_history(&self, team_key: &str) -> Vec<Standup> {
        self.read()
            .iter()
            .find(|bucket| bucket.key == team_key)
            .map(|bucket| bucket.standups.clone())
            .unwrap_or_default()
    }

    /// Look a standup up by id across every team.
    pub fn find(&self, standup_id: &str) -> Option<Standup> {
        self.read()
            .iter()
            .flat_map(|bucket| bucket.standups.iter())
            .find(|standup| standup.id == standup_id)
            .cloned()
    }

    /// Insert `standup` at the front of `team_key`'s history, creating the
    /// team bucket if this is its first meeting.
    pub fn prepend(&self, team_key: &str, standup: Standup) {
        let mut teams = self.write();
        match teams.iter_mut().find(|bucket| bucket.key == team_key) {
            Some(bucket) => bucket.standups.insert(0, standup),
            None => {
                debug!(team = team_key, "creating new team bucket");
                teams.push(TeamBucket {
                    key: team_key.to_string(),
                    standups: vec![standup],
                });
            }
        }
    }

    /// Number of team buckets.
    pub fn team_count(&self) -> usize {
        self.read().len()
    }

    /// Number of standups across all teams.
    pub fn standup_count(&self) -> usize {
        self.read().iter().map(|bucket| bucket.standups.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

fn turn(
    speaker: &str,
    time: &str,
    yesterday: &str,
    today: &str,
    blockers: &str,
    raw_content: &str,
) -> SpeakerTurn {
    SpeakerTurn {
        speaker: speaker.into(),
        initial: speaker.chars().take(1).collect(),
        time: time.into(),
        yesterday: yesterday.into(),
        today: today.into(),
        blockers: blockers.into(),
        raw_content: raw_content.into(),
    }
}

fn sample_standup() -> Standup {
    Standup {
        id: "dev-20250612".into(),
        date: "12/06/2025".into(),
        is_today: Some(true),
        team: "Development".into(),
        summary: vec![
            turn(
                "Alice Johnson",
                "09:00-09:03",
                "Completed the user authentication module and fixed the critical login bug that was affecting mobile users.",
                "Will work on implementing the password reset functionality and integrate it with our email service provider.",
                "No blockers at the moment.",
                "Yesterday I finished the auth module and fixed that mobile login issue. Today I'm working on password reset integration. No blockers right now.",
            ),
            turn(
                "Bob Chen",
                "09:03-09:06",
                "Finished database migrations for the new user profile schema and updated all related API endpoints.",
                "Planning to develop the frontend components for the enhanced profile page and conduct thorough testing.",
                "Blocked on getting admin access to the staging environment. Need IT approval for deployment permissions.",
                "Got the database migrations done for user profiles, updated APIs. Working on frontend components today. Still blocked on staging access - need IT approval.",
            ),
            turn(
                "Carol Martinez",
                "09:06-09:09",
                "Reviewed and merged 5 pull requests, deployed version 2.1.3 to staging environment successfully.",
                "Will focus on building the new monitoring dashboard and setting up automated alerts for production.",
                "No blockers. All systems are running smoothly.",
                "Yesterday reviewed 5 PRs, deployed v2.1.3 to staging. Today working on monitoring dashboard and production alerts. No issues.",
            ),
        ],
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
