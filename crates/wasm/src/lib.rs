#![warn(clippy::pedantic)]

use canvas2ics_core::{Snapshot, SyncOptions, TimetableConfig};
use chrono_tz::Tz;
use wasm_bindgen::prelude::{wasm_bindgen, JsError};

/// Renders a calendar from a JSON snapshot of Canvas data. An empty or
/// malformed timetable is treated as no timetable, and an empty timezone as
/// the default one.
#[wasm_bindgen]
pub fn from_snapshot(snapshot: &str, timetable: &str, timezone: &str) -> Result<String, JsError> {
	let snapshot: Snapshot = serde_json::from_str(snapshot)?;
	let config = TimetableConfig::from_json_or_default(timetable);
	let tz = if timezone.trim().is_empty() {
		canvas2ics_core::TZ
	} else {
		timezone
			.trim()
			.parse::<Tz>()
			.map_err(|e| JsError::new(&e.to_string()))?
	};

	let options = SyncOptions::new(tz, chrono::Utc::now());
	let calendar = canvas2ics_core::create_calendar(&snapshot, &config, &options)?;

	Ok(calendar.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snapshot_renders_class_slots() {
		let snapshot = r#"{"courses": [{"course": {"id": 7, "name": "Visual Programming", "course_code": "CS 492"}}]}"#;
		let timetable = r#"{"CS 492": {"days": [0], "times": [["09:00", "10:00"]]}}"#;

		let ics = from_snapshot(snapshot, timetable, "").unwrap();

		assert!(ics.contains("SUMMARY:🏫 CS 492"));
		assert!(ics.contains("RRULE:FREQ=WEEKLY"));
	}

	#[test]
	fn empty_snapshot_renders_empty_calendar() {
		let ics = from_snapshot("{}", "", "Europe/Berlin").unwrap();

		assert!(ics.contains("BEGIN:VCALENDAR"));
		assert!(!ics.contains("BEGIN:VEVENT"));
	}
}
