//! Weekly timetable configuration, keyed by course.
//!
//! ```json
//! {
//!   "CS 492": { "days": [0, 2], "sections": ["L2"], "times": [["09:00", "10:30"]] }
//! }
//! ```

use chrono::{NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Weekday indices as used in the configuration. 0 = Monday.
pub const WEEKDAYS: [Weekday; 7] = [
	Weekday::Mon,
	Weekday::Tue,
	Weekday::Wed,
	Weekday::Thu,
	Weekday::Fri,
	Weekday::Sat,
	Weekday::Sun,
];

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("timetable is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("timetable must be a JSON object keyed by course")]
	NotAnObject,
	#[error("timetable entry {key:?} is malformed: {source}")]
	Entry {
		key: String,
		source: serde_json::Error,
	},
}

#[derive(Debug, Deserialize)]
struct RawEntry {
	#[serde(default)]
	days: Vec<i64>,
	#[serde(default)]
	sections: Vec<String>,
	#[serde(default)]
	times: Vec<Vec<String>>,
	#[serde(default)]
	until: Option<NaiveDate>,
}

/// The weekly schedule of one configured course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassScheduleEntry {
	pub course: String,
	pub days: Vec<Weekday>,
	/// `[start, end]` pairs of `HH:MM` strings, validated per slot when events
	/// are generated.
	pub times: Vec<Vec<String>>,
	pub sections: Vec<String>,
	/// Last day of the term, inclusive.
	pub until: Option<NaiveDate>,
}

impl ClassScheduleEntry {
	fn from_raw(course: String, raw: RawEntry) -> Self {
		let mut days = Vec::with_capacity(raw.days.len());

		for index in raw.days {
			match usize::try_from(index).ok().and_then(|i| WEEKDAYS.get(i).copied()) {
				Some(day) if !days.contains(&day) => days.push(day),
				Some(_) => {}
				None => warn!(course = %course, index, "ignoring weekday outside 0..=6"),
			}
		}

		Self {
			course,
			days,
			times: raw.times,
			sections: raw.sections,
			until: raw.until,
		}
	}
}

/// Timetable entries in the order they appear in the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimetableConfig {
	entries: Vec<ClassScheduleEntry>,
}

impl TimetableConfig {
	#[must_use]
	pub fn new(entries: Vec<ClassScheduleEntry>) -> Self {
		Self { entries }
	}

	/// Parses a timetable document. Entries with the wrong shape are skipped
	/// with a warning, only an unreadable document is an error.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let Value::Object(map) = serde_json::from_str::<Value>(json)? else {
			return Err(ConfigError::NotAnObject);
		};

		Ok(Self::from_map(map))
	}

	/// Like [`TimetableConfig::from_json`], but degrades to an empty
	/// timetable instead of failing.
	#[must_use]
	pub fn from_json_or_default(json: &str) -> Self {
		if json.trim().is_empty() {
			return Self::default();
		}

		Self::from_json(json).unwrap_or_else(|error| {
			warn!(%error, "using an empty timetable");
			Self::default()
		})
	}

	fn from_map(map: Map<String, Value>) -> Self {
		let mut entries = Vec::with_capacity(map.len());

		for (key, value) in map {
			match serde_json::from_value::<RawEntry>(value) {
				Ok(raw) => entries.push(ClassScheduleEntry::from_raw(key, raw)),
				Err(source) => {
					let error = ConfigError::Entry { key, source };
					warn!(%error, "skipping timetable entry");
				}
			}
		}

		Self { entries }
	}

	#[must_use]
	pub fn entries(&self) -> &[ClassScheduleEntry] {
		&self.entries
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn get(&self, course: &str) -> Option<&ClassScheduleEntry> {
		self.entries.iter().find(|entry| entry.course == course)
	}

	#[must_use]
	pub fn match_course(&self, course_code: &str, course_name: &str) -> Option<&ClassScheduleEntry> {
		match_course(course_code, course_name, &self.entries)
	}
}

fn normalize(s: &str) -> String {
	s.chars()
		.filter(|c| !c.is_whitespace())
		.collect::<String>()
		.to_uppercase()
}

/// Finds the timetable entry for a course, ignoring whitespace and case.
///
/// In order of preference: a key equal to the course code, the longest key
/// the course code and name start with, then the first key (in configuration
/// order) contained in, or containing, the course text.
#[must_use]
pub fn match_course<'a>(
	course_code: &str,
	course_name: &str,
	configured: &'a [ClassScheduleEntry],
) -> Option<&'a ClassScheduleEntry> {
	let code = normalize(course_code);
	let text = format!("{code}{}", normalize(course_name));

	let keys = configured
		.iter()
		.map(|entry| (normalize(&entry.course), entry))
		.filter(|(key, _)| !key.is_empty())
		.collect::<Vec<_>>();

	if let Some((_, entry)) = keys.iter().find(|(key, _)| *key == code) {
		return Some(*entry);
	}

	if let Some((key, entry)) = keys
		.iter()
		.filter(|(key, _)| text.starts_with(key.as_str()))
		.max_by_key(|(key, _)| key.len())
	{
		debug!(course = course_code, key = %key, "matched timetable entry by prefix");
		return Some(*entry);
	}

	keys.iter()
		.find(|(key, _)| text.contains(key.as_str()) || key.contains(text.as_str()))
		.map(|(key, entry)| {
			debug!(course = course_code, key = %key, "matched timetable entry by containment");
			*entry
		})
}
