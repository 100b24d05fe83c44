use crate::api::*;
use crate::structs::*;
use crate::ticket::*;
use crate::timetable::*;

use std::collections::HashSet;
use url::Url;

fn bus(id: i64, name: &str, location: &str, destination: &str) -> Bus {
    Bus {
        id,
        name: name.to_string(),
        location: location.to_string(),
        destination: destination.to_string(),
        passengers: 12,
        fuel: 80,
        image: Url::parse("https://example.com/bus.png").unwrap(),
    }
}

fn sample_buses() -> Vec<Bus> {
    vec![
        bus(1, "Red Line", "Downtown", "Airport"),
        bus(2, "Blue Express", "Harbour", "Central Station"),
        bus(3, "Night Owl", "Airport", "Old Town"),
    ]
}

//////////////////////////////////////////////////////////
// Filtering
//////////////////////////////////////////////////////////

#[test]
fn empty_query_is_identity() {
    let buses = sample_buses();
    assert_eq!(filter_buses(&buses, ""), buses);
}

#[test]
fn filter_preserves_source_order() {
    let buses = sample_buses();
    // "air" hits bus 1 by destination and bus 3 by location.
    let visible = filter_buses(&buses, "air");
    assert_eq!(
        visible.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[test]
fn filter_is_case_insensitive() {
    let buses = sample_buses();
    assert_eq!(filter_buses(&buses, "red")[0].id, 1);
    assert_eq!(filter_buses(&buses, "HARBOUR")[0].id, 2);
    assert_eq!(filter_buses(&buses, "nIgHt OwL")[0].id, 3);
}

#[test]
fn filter_matches_all_three_text_fields() {
    let buses = sample_buses();
    assert_eq!(filter_buses(&buses, "owl")[0].id, 3); // name
    assert_eq!(filter_buses(&buses, "down")[0].id, 1); // location
    assert_eq!(filter_buses(&buses, "central")[0].id, 2); // destination
}

#[test]
fn filter_never_matches_ids_counts_or_image() {
    let buses = sample_buses();
    assert!(filter_buses(&buses, "80").is_empty());
    assert!(filter_buses(&buses, "12").is_empty());
    assert!(filter_buses(&buses, "example.com").is_empty());
}

#[test]
fn unmatched_query_yields_empty_list() {
    let buses = vec![bus(1, "Red Line", "Downtown", "Airport")];
    assert!(filter_buses(&buses, "blue").is_empty());
}

//////////////////////////////////////////////////////////
// Favorites
//////////////////////////////////////////////////////////

#[test]
fn toggle_twice_restores_membership() {
    let mut favorites = HashSet::new();

    toggle_favorite(&mut favorites, 7);
    assert!(favorites.contains(&7));

    toggle_favorite(&mut favorites, 7);
    assert!(!favorites.contains(&7));
}

#[test]
fn favorite_survives_changed_mutable_fields() {
    let mut favorites = HashSet::new();
    toggle_favorite(&mut favorites, 1);

    // The same bus comes back from a re-fetch with a different fuel level.
    let mut refetched = bus(1, "Red Line", "Downtown", "Airport");
    refetched.fuel = 15;
    assert!(favorites.contains(&refetched.id));
}

#[test]
fn bus_row_marks_favorites_and_escapes_html() {
    let b = bus(1, "Red <Line>", "Downtown", "Airport");

    let row = format_bus_row(&b, true);
    assert!(row.starts_with("❤️ "));
    assert!(row.contains("Red &lt;Line&gt;"));

    let row = format_bus_row(&b, false);
    assert!(!row.contains("❤️"));
}

//////////////////////////////////////////////////////////
// Ticket identity & badge
//////////////////////////////////////////////////////////

#[test]
fn identifier_concatenates_without_separator() {
    let ticket = UserTicket {
        name: "Jane".to_string(),
        reference: "42".to_string(),
    };
    assert_eq!(ticket.identifier(), "Jane42");

    let name_only = UserTicket {
        name: "Jane".to_string(),
        reference: String::new(),
    };
    assert_eq!(name_only.identifier(), "Jane");

    let reference_only = UserTicket {
        name: String::new(),
        reference: "42".to_string(),
    };
    assert_eq!(reference_only.identifier(), "42");

    assert_eq!(UserTicket::default().identifier(), "");
}

#[test]
fn badge_shown_iff_identifier_is_empty() {
    let mut ticket = UserTicket::default();
    assert!(ticket.is_incomplete());

    ticket.reference = "42".to_string();
    assert!(!ticket.is_incomplete());

    ticket.reference.clear();
    ticket.name = "Jane".to_string();
    assert!(!ticket.is_incomplete());
}

//////////////////////////////////////////////////////////
// Decoding
//////////////////////////////////////////////////////////

#[test]
fn decode_sample_payload() {
    let body = r#"[{"id":1,"name":"Red Line","location":"Downtown","destination":"Airport","passengers":12,"fuel":80,"image":"https://x/img.png"}]"#;

    let buses = decode_timetable(body).unwrap();
    assert_eq!(buses.len(), 1);
    assert_eq!(buses[0].name, "Red Line");
    assert_eq!(buses[0].passengers, 12);
    assert_eq!(buses[0].fuel, 80);

    assert_eq!(filter_buses(&buses, "red"), buses);
    assert!(filter_buses(&buses, "blue").is_empty());
}

#[test]
fn decode_missing_field_is_a_decode_error() {
    // "fuel" is absent.
    let body = r#"[{"id":1,"name":"Red Line","location":"Downtown","destination":"Airport","passengers":12,"image":"https://x/img.png"}]"#;

    let err = decode_timetable(body).unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[test]
fn decode_rejects_unknown_fields() {
    let body = r#"[{"id":1,"name":"Red Line","location":"Downtown","destination":"Airport","passengers":12,"fuel":80,"image":"https://x/img.png","color":"red"}]"#;

    assert!(matches!(
        decode_timetable(body).unwrap_err(),
        FetchError::Decode(_)
    ));
}

#[test]
fn decode_rejects_invalid_image_url() {
    let body = r#"[{"id":1,"name":"Red Line","location":"Downtown","destination":"Airport","passengers":12,"fuel":80,"image":"not a url"}]"#;

    assert!(matches!(
        decode_timetable(body).unwrap_err(),
        FetchError::Decode(_)
    ));
}

//////////////////////////////////////////////////////////
// Fetch state machine
//////////////////////////////////////////////////////////

#[test]
fn failed_fetch_leaves_list_untouched() {
    let mut session = Session {
        buses: sample_buses(),
        ..Session::default()
    };
    assert!(session.begin_fetch());

    let err = decode_timetable("not even json").unwrap_err();
    session.apply_fetch(Err(err));

    assert_eq!(session.buses, sample_buses());
}

#[test]
fn successful_fetch_replaces_whole_list() {
    let mut session = Session {
        buses: sample_buses(),
        ..Session::default()
    };
    assert!(session.begin_fetch());

    let replacement = vec![bus(9, "Shuttle", "Depot", "Terminal")];
    session.apply_fetch(Ok(replacement.clone()));

    assert_eq!(session.buses, replacement);
}

#[test]
fn second_fetch_is_refused_while_one_is_in_flight() {
    let mut session = Session::default();

    assert!(session.begin_fetch());
    assert!(!session.begin_fetch());

    session.apply_fetch(Ok(vec![]));
    assert!(session.begin_fetch());
}

//////////////////////////////////////////////////////////
// Ticket QR
//////////////////////////////////////////////////////////

#[test]
fn ticket_png_renders_a_png() {
    let png = ticket_png("Jane42").unwrap();
    assert_eq!(png[..8], [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
}
