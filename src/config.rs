pub const TIMETABLE_URL: &str = "https://www.hackingwithswift.com/samples/bus-timetable";

/// The fixed timetable endpoint, overridable through TIMETABLE_URL for
/// pointing the bot at a test server.
pub fn timetable_url() -> String {
    std::env::var("TIMETABLE_URL").unwrap_or_else(|_| TIMETABLE_URL.to_string())
}
