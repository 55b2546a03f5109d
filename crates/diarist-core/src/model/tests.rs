use chrono::{DateTime, Duration, Local, TimeZone};

use crate::model::*;

fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 12, 14, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

fn reflection() -> Reflection {
    Reflection {
        diary: "A calm day.".to_string(),
        summary: "1. Calm".to_string(),
        insights: "Rest more.".to_string(),
    }
}

#[test]
fn test_session_start() {
    let session = Session::start(at(8, 30));
    assert_eq!(session.date().to_string(), "2025-12-14");
    assert_eq!(session.start_time(), at(8, 30));
    assert!(session.is_active());
    assert!(session.end_time().is_none());
    assert_eq!(session.entry_count(), 0);
    assert!(session.reflection().is_none());
}

#[test]
fn test_entries_keep_creation_order() {
    let mut session = Session::start(at(8, 0));
    session.push_entry("coffee", at(8, 5)).unwrap();
    session.push_entry("walk", at(9, 0)).unwrap();
    session.push_entry("read", at(21, 0)).unwrap();

    assert_eq!(session.entry_contents(), vec!["coffee", "walk", "read"]);
    assert_eq!(session.entries()[1].timestamp, at(9, 0));
}

#[test]
fn test_push_after_close_rejected() {
    let mut session = Session::start(at(8, 0));
    session.push_entry("one", at(8, 1)).unwrap();
    assert!(session.close(at(22, 0)));

    let err = session.push_entry("late", at(23, 0)).unwrap_err();
    assert!(matches!(err, crate::error::DiaristError::InvalidInput(_)));
    assert_eq!(session.entry_count(), 1);
}

#[test]
fn test_end_time_set_once() {
    let mut session = Session::start(at(8, 0));
    assert!(session.close(at(22, 0)));
    assert!(!session.close(at(23, 0)));
    assert_eq!(session.end_time(), Some(at(22, 0)));
}

#[test]
fn test_complete_sets_all_sections() {
    let mut session = Session::start(at(8, 0));
    session.push_entry("one", at(8, 1)).unwrap();
    session.complete(reflection(), at(22, 0)).unwrap();

    assert!(!session.is_active());
    assert_eq!(session.end_time(), Some(at(22, 0)));
    assert_eq!(session.reflection(), Some(reflection()));
}

#[test]
fn test_complete_closed_session_rejected() {
    let mut session = Session::start(at(8, 0));
    session.close(at(9, 0));
    assert!(session.complete(reflection(), at(10, 0)).is_err());
    assert!(session.reflection().is_none());
}

#[test]
fn test_session_json_roundtrip() {
    let mut session = Session::start(at(8, 0));
    session.push_entry("first", at(8, 0) + Duration::minutes(3)).unwrap();
    session.complete(reflection(), at(22, 0)).unwrap();

    let json = serde_json::to_string_pretty(&session).unwrap();
    assert!(json.contains("\"date\": \"2025-12-14\""));
    assert!(json.contains("\"generated_diary\""));

    let parsed: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, session);
}

#[test]
fn test_active_session_json_omits_sections() {
    let mut session = Session::start(at(8, 0));
    session.push_entry("first", at(8, 1)).unwrap();

    let json = serde_json::to_string(&session).unwrap();
    assert!(!json.contains("generated_diary"));
    assert!(!json.contains("end_time"));
}

#[test]
fn test_session_json_ignores_unknown_fields() {
    let json = r#"{
        "date": "2025-12-14",
        "start_time": "2025-12-14T08:00:00+00:00",
        "active": false,
        "entries": [],
        "entry_count": 0
    }"#;
    let parsed: Session = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.date().to_string(), "2025-12-14");
    assert!(!parsed.is_active());
}
