use animiru_tracker::{TrackRecord, TrackStatus};

pub use animiru_tracker::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAnime {
    pub anime_id: i64,
    pub tracker: String,
    pub record: TrackRecord,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub status: Option<TrackStatus>,
    pub score: Option<f64>,
    pub last_episode_seen: Option<f64>,
}

impl TrackingUpdate {
    pub fn apply(&self, record: &TrackRecord) -> TrackRecord {
        TrackRecord {
            status: self.status.unwrap_or(record.status),
            score: self.score.unwrap_or(record.score),
            last_episode_seen: self.last_episode_seen.unwrap_or(record.last_episode_seen),
            ..record.clone()
        }
    }
}
