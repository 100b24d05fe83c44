use std::collections::HashSet;

use serde::Deserialize;
use url::Url;

use crate::api::FetchError;

/// One timetable entry as decoded from the server response.
///
/// Strict shape: every field is required and unknown fields are rejected,
/// so a malformed payload fails the whole decode instead of producing a
/// half-filled record. Never mutated after decoding.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct Bus {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub destination: String,
    pub passengers: u32,
    /// Fuel percentage, 0-100 by convention. Not validated.
    pub fuel: i64,
    pub image: Url,
}

/// The two editable ticket fields. Their concatenation is the QR payload.
#[derive(Debug, Clone, Default)]
pub struct UserTicket {
    pub name: String,
    pub reference: String,
}

impl UserTicket {
    /// Name and reference joined with no separator, no trimming.
    pub fn identifier(&self) -> String {
        format!("{}{}", self.name, self.reference)
    }

    /// Drives the `❗` badge on the menu.
    pub fn is_incomplete(&self) -> bool {
        self.identifier().is_empty()
    }
}

/// Per-chat state. Created on first contact, lives for the process lifetime,
/// nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub buses: Vec<Bus>,
    /// Favorites are keyed by bus id, not full-record equality, so a
    /// re-fetch that changes fuel or passenger counts keeps the favorite.
    pub favorites: HashSet<i64>,
    pub query: String,
    pub ticket: UserTicket,
    /// In-flight guard, managed through `begin_fetch` / `apply_fetch`.
    pub fetching: bool,
}

impl Session {
    /// Claims the in-flight slot. Returns false when a fetch is already
    /// outstanding for this chat, in which case the caller must not fetch.
    pub fn begin_fetch(&mut self) -> bool {
        if self.fetching {
            return false;
        }
        self.fetching = true;
        true
    }

    /// Applies a fetch outcome: on success the whole list is replaced, on
    /// failure the existing list is left untouched and the error only goes
    /// to the log. Always releases the in-flight slot.
    pub fn apply_fetch(&mut self, result: Result<Vec<Bus>, FetchError>) {
        self.fetching = false;
        match result {
            Ok(buses) => self.buses = buses,
            Err(e) => log::error!("timetable fetch failed: {e}"),
        }
    }
}
