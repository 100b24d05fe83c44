use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use thiserror::Error;

use crate::structs::Bus;

//////////////////////////////////////////////////////////
// API calls
//////////////////////////////////////////////////////////

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("response body does not match the timetable shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decodes a raw response body into the full bus list. Strict: a single
/// missing, unknown or malformed field rejects the whole payload.
pub fn decode_timetable(body: &str) -> Result<Vec<Bus>, FetchError> {
    Ok(serde_json::from_str(body)?)
}

/// Fetches the complete timetable in one GET. No pagination, no auth.
pub async fn fetch_timetable(url: &str) -> Result<Vec<Bus>, FetchError> {
    let client = reqwest::Client::new();
    let body = client
        .get(url)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .header(USER_AGENT, "reqwest/0.11.13")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    decode_timetable(&body)
}
