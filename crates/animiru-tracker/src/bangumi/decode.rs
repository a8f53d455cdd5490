use serde::Deserialize;
use serde_json::Value;

use crate::{DecodeError, SearchResult, TrackRecord, TrackStatus};

/// Subject type tag for anime.
const SUBJECT_TYPE_ANIME: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Wish,
    Collect,
    Do,
    OnHold,
    Dropped,
}

impl CollectionStatus {
    pub fn id(&self) -> i64 {
        match self {
            CollectionStatus::Wish => 1,
            CollectionStatus::Collect => 2,
            CollectionStatus::Do => 3,
            CollectionStatus::OnHold => 4,
            CollectionStatus::Dropped => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Wish => "wish",
            CollectionStatus::Collect => "collect",
            CollectionStatus::Do => "do",
            CollectionStatus::OnHold => "on_hold",
            CollectionStatus::Dropped => "dropped",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(CollectionStatus::Wish),
            2 => Some(CollectionStatus::Collect),
            3 => Some(CollectionStatus::Do),
            4 => Some(CollectionStatus::OnHold),
            5 => Some(CollectionStatus::Dropped),
            _ => None,
        }
    }
}

impl From<TrackStatus> for CollectionStatus {
    fn from(status: TrackStatus) -> Self {
        match status {
            TrackStatus::Watching => CollectionStatus::Do,
            TrackStatus::Completed => CollectionStatus::Collect,
            TrackStatus::OnHold => CollectionStatus::OnHold,
            TrackStatus::Dropped => CollectionStatus::Dropped,
            TrackStatus::PlanToWatch => CollectionStatus::Wish,
        }
    }
}

impl From<CollectionStatus> for TrackStatus {
    fn from(status: CollectionStatus) -> Self {
        match status {
            CollectionStatus::Do => TrackStatus::Watching,
            CollectionStatus::Collect => TrackStatus::Completed,
            CollectionStatus::OnHold => TrackStatus::OnHold,
            CollectionStatus::Dropped => TrackStatus::Dropped,
            CollectionStatus::Wish => TrackStatus::PlanToWatch,
        }
    }
}

fn track_status(id: i64) -> TrackStatus {
    match CollectionStatus::from_id(id) {
        Some(status) => status.into(),
        None => {
            warn!("unknown bangumi collection status {id}");
            TrackStatus::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    code: i64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    request: Option<String>,
}

impl ErrorEnvelope {
    fn from_value(value: &Value) -> Option<Self> {
        value.get("code")?.as_i64()?;
        serde_json::from_value(value.clone()).ok()
    }

    fn is_error(&self) -> bool {
        self.code >= 400
    }

    fn into_error(self) -> DecodeError {
        DecodeError::Remote {
            code: self.code,
            message: self
                .error
                .or(self.request)
                .unwrap_or_else(|| "".to_string()),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Subject {
    id: Option<i64>,
    name: Option<String>,
    name_cn: Option<String>,
    url: Option<String>,
    eps_count: Option<i64>,
    /// Anything but an object means no cover.
    images: Option<Value>,
}

impl TryFrom<Subject> for SearchResult {
    type Error = DecodeError;

    fn try_from(subject: Subject) -> Result<Self, Self::Error> {
        let name = subject.name.ok_or(DecodeError::MissingField("name"))?;
        let title = subject
            .name_cn
            .filter(|name_cn| !name_cn.is_empty())
            .unwrap_or_else(|| name.clone());

        Ok(SearchResult {
            media_id: subject.id.ok_or(DecodeError::MissingField("id"))?,
            title,
            cover_url: match subject.images {
                Some(Value::Object(images)) => images
                    .get("common")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => "".to_string(),
            },
            summary: name,
            tracking_url: subject.url.ok_or(DecodeError::MissingField("url"))?,
            total_episodes: subject.eps_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
struct StatusField {
    id: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Collection {
    status: Option<StatusField>,
    ep_status: Option<i64>,
    rating: Option<f64>,
}

fn parse(body: &str) -> Result<Value, DecodeError> {
    if body.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

/// Anime entries of a search response, in response order. Entries without a
/// type tag are kept.
pub fn decode_search_list(body: &str) -> Result<Vec<SearchResult>, DecodeError> {
    let value = parse(body)?;

    if let Some(envelope) = ErrorEnvelope::from_value(&value) {
        if envelope.code == 404 {
            return Ok(vec![]);
        }
        if envelope.is_error() {
            return Err(envelope.into_error());
        }
    }

    let list = match value.get("list") {
        Some(Value::Array(list)) => list,
        _ => return Ok(vec![]),
    };

    list.iter()
        .filter(|entry| match entry.get("type") {
            None | Some(Value::Null) => true,
            Some(kind) => kind.as_i64() == Some(SUBJECT_TYPE_ANIME),
        })
        .map(|entry| {
            let subject: Subject = serde_json::from_value(entry.clone())?;
            SearchResult::try_from(subject)
        })
        .collect()
}

pub fn decode_subject(body: &str) -> Result<SearchResult, DecodeError> {
    let value = parse(body)?;

    if let Some(envelope) = ErrorEnvelope::from_value(&value) {
        if envelope.code == 404 {
            return Err(DecodeError::NotFound);
        }
        if envelope.is_error() {
            return Err(envelope.into_error());
        }
    }

    let subject: Subject = serde_json::from_value(value)?;
    SearchResult::try_from(subject)
}

fn decode_collection(body: &str) -> Result<Collection, DecodeError> {
    let value = parse(body)?;

    if let Some(envelope) = ErrorEnvelope::from_value(&value) {
        if envelope.code == 400 || envelope.code == 404 {
            return Err(DecodeError::NotFound);
        }
        if envelope.is_error() {
            return Err(envelope.into_error());
        }
    }

    Ok(serde_json::from_value(value)?)
}

/// The remote state of `record`, or `None` when it is not in the user's list.
pub fn decode_status(
    body: &str,
    record: &TrackRecord,
) -> Result<Option<TrackRecord>, DecodeError> {
    let collection = match decode_collection(body) {
        Ok(collection) => collection,
        Err(DecodeError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };

    let status_id = collection
        .status
        .and_then(|status| status.id)
        .ok_or(DecodeError::MissingField("status.id"))?;
    let ep_status = collection
        .ep_status
        .ok_or(DecodeError::MissingField("ep_status"))?;
    let rating = collection
        .rating
        .ok_or(DecodeError::MissingField("rating"))?;

    Ok(Some(TrackRecord {
        status: track_status(status_id),
        last_episode_seen: ep_status as f64,
        score: rating,
        ..record.clone()
    }))
}

/// Mutation responses carry nothing the client needs unless they are an error.
pub fn decode_ack(body: &str) -> Result<(), DecodeError> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };

    match ErrorEnvelope::from_value(&value) {
        Some(envelope) if envelope.is_error() => Err(envelope.into_error()),
        _ => Ok(()),
    }
}
