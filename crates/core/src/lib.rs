#![warn(clippy::pedantic)]

use icalendar::Calendar;

pub mod config;
pub mod event;
pub mod extract;
pub mod relevance;
pub mod source;
pub mod sync;
pub mod timetable;

#[cfg(feature = "client")]
pub mod client;

pub use config::{match_course, ClassScheduleEntry, TimetableConfig};
pub use event::{to_calendar, CalendarEvent, EventTime};
pub use extract::{extract_date, infer_date, DateSource, InferredDate};
pub use relevance::is_relevant;
pub use source::{CourseSource, Snapshot, SourceError};
pub use sync::{collect_events, Skipped, SyncOptions, SyncReport};
pub use timetable::generate_weekly_events;

/// Timezone used when none is configured.
pub const TZ: chrono_tz::Tz = chrono_tz::America::Toronto;

/// Fetches everything from `source` and renders it as a single calendar.
///
/// # Errors
///
/// Returns the source's error when it cannot be used at all, see
/// [`SourceError::is_fatal`].
pub fn create_calendar<S: CourseSource + ?Sized>(
	source: &S,
	config: &TimetableConfig,
	options: &SyncOptions,
) -> Result<Calendar, SourceError> {
	let report = collect_events(source, config, options);

	if let Some(error) = report.fatal {
		return Err(error);
	}

	Ok(to_calendar(&report.events, options.tz))
}
