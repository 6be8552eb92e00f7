use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::{
	config::{ClassScheduleEntry, TimetableConfig},
	event::{CalendarEvent, EventTime},
	extract::{infer_date, plain_text},
	relevance::is_relevant,
	source::{Announcement, Assignment, CalendarEntry, Course, CourseSource, SourceError},
	timetable::weekly_slots,
};

/// Words in an announcement title that mark it as important.
const URGENT_WORDS: [&str; 2] = ["exam", "urgent"];

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
	/// Civil timezone all local dates and times are expressed in.
	pub tz: Tz,
	pub now: DateTime<Utc>,
	/// How far back to look for announcements and calendar entries.
	pub days_back: u32,
	/// How far ahead to look for calendar entries.
	pub days_ahead: u32,
}

impl SyncOptions {
	#[must_use]
	pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
		Self {
			tz,
			now,
			days_back: 14,
			days_ahead: 120,
		}
	}

	/// Start of the look-back window, clamped to the earliest representable
	/// instant.
	#[must_use]
	pub fn window_start(&self) -> DateTime<Utc> {
		self.now
			.checked_sub_signed(TimeDelta::days(i64::from(self.days_back)))
			.unwrap_or(DateTime::<Utc>::MIN_UTC)
	}

	/// End of the look-ahead window, clamped to the latest representable
	/// instant.
	#[must_use]
	pub fn window_end(&self) -> DateTime<Utc> {
		self.now
			.checked_add_signed(TimeDelta::days(i64::from(self.days_ahead)))
			.unwrap_or(DateTime::<Utc>::MAX_UTC)
	}
}

/// Something that was left out of the calendar, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
	pub unit: String,
	pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
	pub events: Vec<CalendarEvent>,
	pub skipped: Vec<Skipped>,
	/// Set when the source could not be used at all. No events are collected
	/// in that case, and the report should not be rendered.
	pub fatal: Option<SourceError>,
}

impl SyncReport {
	fn skip(&mut self, unit: impl Into<String>, reason: impl fmt::Display) {
		let unit = unit.into();
		let reason = reason.to_string();

		warn!(unit = %unit, reason = %reason, "skipping");
		self.skipped.push(Skipped { unit, reason });
	}
}

fn course_label(course: &Course, name: &str) -> String {
	if course.course_code.trim().is_empty() {
		name.to_string()
	} else {
		course.course_code.clone()
	}
}

fn with_link(text: String, url: Option<&str>) -> String {
	match url {
		Some(url) if text.is_empty() => url.to_string(),
		Some(url) => format!("{text}\n{url}"),
		None => text,
	}
}

fn assignment_event(assignment: &Assignment, label: &str, tz: Tz) -> Option<CalendarEvent> {
	let due = assignment.due_at?.with_timezone(&tz);

	Some(CalendarEvent {
		uid: format!("assignment-{}@canvas2ics", assignment.id),
		summary: format!("📝 {} ({label})", assignment.name),
		description: with_link(
			format!("Due: {}", due.format("%Y-%m-%d %H:%M %Z")),
			assignment.html_url.as_deref(),
		),
		url: assignment.html_url.clone(),
		start: EventTime::Timed(due),
		end: None,
		recurrence: None,
	})
}

fn announcement_event(
	announcement: &Announcement,
	label: &str,
	entry: Option<&ClassScheduleEntry>,
	options: &SyncOptions,
) -> CalendarEvent {
	let posted = announcement
		.posted_at
		.unwrap_or(options.now)
		.with_timezone(&options.tz)
		.date_naive();
	let class_days = entry
		.map(|entry| entry.days.as_slice())
		.unwrap_or_default();

	let inferred = infer_date(
		&format!("{}\n{}", announcement.title, announcement.message),
		posted,
		class_days,
	);
	debug!(
		announcement = announcement.id,
		date = %inferred.date,
		source = ?inferred.source,
		"inferred announcement date"
	);

	let title = announcement.title.to_lowercase();
	let icon = if URGENT_WORDS.iter().any(|word| title.contains(word)) {
		"🔥"
	} else {
		"📢"
	};

	CalendarEvent {
		uid: format!("announcement-{}@canvas2ics", announcement.id),
		summary: format!("{icon} {} ({label})", announcement.title),
		description: with_link(
			plain_text(&announcement.message),
			announcement.url.as_deref(),
		),
		url: announcement.url.clone(),
		start: EventTime::AllDay(inferred.date),
		end: None,
		recurrence: None,
	}
}

fn calendar_entry_event(entry: &CalendarEntry, tz: Tz) -> CalendarEvent {
	let start = entry.start_at.with_timezone(&tz);

	let (start, end) = if entry.all_day {
		(EventTime::AllDay(start.date_naive()), None)
	} else {
		(
			EventTime::Timed(start),
			entry
				.end_at
				.filter(|end| *end > entry.start_at)
				.map(|end| EventTime::Timed(end.with_timezone(&tz))),
		)
	};

	CalendarEvent {
		uid: format!("calendar-{}@canvas2ics", entry.id),
		summary: format!("📅 {}", entry.title),
		description: with_link(
			entry.description.as_deref().map(plain_text).unwrap_or_default(),
			entry.html_url.as_deref(),
		),
		url: entry.html_url.clone(),
		start,
		end,
		recurrence: None,
	}
}

fn collect_course<S: CourseSource + ?Sized>(
	source: &S,
	course: &Course,
	config: &TimetableConfig,
	options: &SyncOptions,
	report: &mut SyncReport,
) {
	let Some(name) = course.name.as_deref() else {
		debug!(course = course.id, "skipping course without a name");
		return;
	};

	let label = course_label(course, name);
	let entry = config.match_course(&course.course_code, name);

	match entry {
		Some(entry) => debug!(course = %label, timetable = %entry.course, "matched timetable entry"),
		None => debug!(course = %label, "no timetable entry"),
	}

	match source.assignments(course.id) {
		Ok(assignments) => report.events.extend(
			assignments
				.iter()
				.filter_map(|assignment| assignment_event(assignment, &label, options.tz)),
		),
		Err(error) => report.skip(format!("assignments of {label}"), error),
	}

	let announcements = match source.announcements(course.id, options.window_start(), options.now) {
		Ok(announcements) => announcements,
		Err(error) => return report.skip(format!("announcements of {label}"), error),
	};

	for announcement in &announcements {
		if let Some(entry) = entry.filter(|entry| !entry.sections.is_empty()) {
			let body = plain_text(&announcement.message);

			if !is_relevant(&announcement.title, &body, &entry.sections) {
				debug!(course = %label, title = %announcement.title, "announcement is for another section");
				report.skipped.push(Skipped {
					unit: format!("announcement {:?} of {label}", announcement.title),
					reason: "addressed to other sections".to_string(),
				});
				continue;
			}
		}

		report
			.events
			.push(announcement_event(announcement, &label, entry, options));
	}
}

/// Gathers every event of a sync run. Failures are contained to the course,
/// fetch or timetable slot they happen in and recorded in the report, except
/// for a course list that fails with [`SourceError::is_fatal`], which stops
/// the run and is stored in [`SyncReport::fatal`].
pub fn collect_events<S: CourseSource + ?Sized>(
	source: &S,
	config: &TimetableConfig,
	options: &SyncOptions,
) -> SyncReport {
	let mut report = SyncReport::default();

	match source.courses() {
		Ok(courses) => {
			info!(courses = courses.len(), "fetched courses");

			for course in &courses {
				collect_course(source, course, config, options, &mut report);
			}
		}
		Err(fatal) if fatal.is_fatal() => {
			error!(error = %fatal, "could not fetch the course list");
			report.fatal = Some(fatal);
			return report;
		}
		Err(error) => report.skip("course list", error),
	}

	match source.calendar_events(options.window_start(), options.window_end()) {
		Ok(entries) => report.events.extend(
			entries
				.iter()
				.map(|entry| calendar_entry_event(entry, options.tz)),
		),
		Err(error) => report.skip("calendar entries", error),
	}

	for slot in weekly_slots(config.entries(), &options.now, options.tz) {
		match slot {
			Ok(event) => report.events.push(event),
			Err(error) => report.skip(format!("timetable slot of {}", error.course), &error),
		}
	}

	info!(
		events = report.events.len(),
		skipped = report.skipped.len(),
		"collected events"
	);

	report
}
