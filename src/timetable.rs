use std::collections::HashSet;

use teloxide::utils::html::escape;

use crate::structs::Bus;

//////////////////////////////////////////////////////////
// Timetable view-model
//////////////////////////////////////////////////////////

/// The buses that should currently render: every bus whose name, location or
/// destination contains the query, case-insensitively. The searchable fields
/// are this fixed list; ids, counts and the image URL are never matched.
///
/// Order preserving, no side effects. Called on every incoming message while
/// the timetable is open, so the empty query returns the input unchanged
/// instead of matching everything against "".
pub fn filter_buses(buses: &[Bus], query: &str) -> Vec<Bus> {
    if query.is_empty() {
        return buses.to_vec();
    }

    let needle = query.to_lowercase();
    buses
        .iter()
        .filter(|bus| {
            [&bus.name, &bus.location, &bus.destination]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Removes the id if it is a member, inserts it otherwise.
pub fn toggle_favorite(favorites: &mut HashSet<i64>, id: i64) {
    if !favorites.insert(id) {
        favorites.remove(&id);
    }
}

/// One list row, HTML-formatted the way the Telegram message renders it.
pub fn format_bus_row(bus: &Bus, is_favorite: bool) -> String {
    let heart = if is_favorite { "❤️ " } else { "" };
    format!(
        "{}<b>{}</b>\n<i>{}</i> ➠ <i>{}</i>\n👥 {}   ⛽ {}%",
        heart,
        escape(&bus.name),
        escape(&bus.location),
        escape(&bus.destination),
        bus.passengers,
        bus.fuel,
    )
}
