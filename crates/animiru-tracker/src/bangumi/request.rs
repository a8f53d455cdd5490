use anyhow::anyhow;
use oauth2::url::Url;

use crate::{http::HttpRequest, Error, TrackRecord};

use super::decode::CollectionStatus;

const MAX_RESULTS: &str = "20";

fn endpoint(api_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = api_url.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("{api_url} cannot be a base url"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Integer services get the truncated value, so 7.9 is sent as 7.
fn truncated(value: f64) -> String {
    format!("{}", value.trunc() as i64)
}

pub fn search_subject(api_url: &Url, query: &str) -> Result<HttpRequest, Error> {
    let mut url = endpoint(api_url, &["search", "subject", query])?;
    url.query_pairs_mut().append_pair("max_results", MAX_RESULTS);
    Ok(HttpRequest::get(url))
}

pub fn get_subject(api_url: &Url, media_id: i64) -> Result<HttpRequest, Error> {
    let url = endpoint(api_url, &["subject", &media_id.to_string()])?;
    Ok(HttpRequest::get(url))
}

pub fn get_collection(api_url: &Url, media_id: i64) -> Result<HttpRequest, Error> {
    let url = endpoint(api_url, &["collection", &media_id.to_string()])?;
    Ok(HttpRequest::get(url).force_network())
}

/// Status and score; creates the collection entry when absent.
pub fn update_collection(api_url: &Url, record: &TrackRecord) -> Result<HttpRequest, Error> {
    let url = endpoint(
        api_url,
        &["collection", &record.media_id.to_string(), "update"],
    )?;
    let status = CollectionStatus::from(record.status);
    Ok(HttpRequest::post_form(
        url,
        vec![
            ("rating".to_string(), truncated(record.score)),
            ("status".to_string(), status.as_str().to_string()),
        ],
    ))
}

pub fn update_watched_episodes(
    api_url: &Url,
    record: &TrackRecord,
) -> Result<HttpRequest, Error> {
    let url = endpoint(
        api_url,
        &[
            "subject",
            &record.media_id.to_string(),
            "update",
            "watched_eps",
        ],
    )?;
    Ok(HttpRequest::post_form(
        url,
        vec![(
            "watched_eps".to_string(),
            truncated(record.last_episode_seen),
        )],
    ))
}
