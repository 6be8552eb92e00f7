use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use rrule::{Frequency, NWeekday, RRule};
use thiserror::Error;
use tracing::warn;

use crate::{
	config::ClassScheduleEntry,
	event::{CalendarEvent, EventTime},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotErrorKind {
	#[error("expected [start, end], got {0} values")]
	Arity(usize),
	#[error("{0:?} is not an HH:MM time")]
	Time(String),
	#[error("ends at {end} before it starts at {start}")]
	EndsBeforeStart { start: NaiveTime, end: NaiveTime },
	#[error("{0} does not exist in {1}")]
	Nonexistent(NaiveDateTime, Tz),
}

/// A single timetable slot that could not be turned into an event.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{course} on {day}, slot {slot}: {kind}")]
pub struct SlotError {
	pub course: String,
	pub day: Weekday,
	pub slot: usize,
	pub kind: SlotErrorKind,
}

/// Monday of the civil week containing `now` in `tz`.
#[must_use]
pub fn week_start<T: TimeZone>(now: &DateTime<T>, tz: Tz) -> NaiveDate {
	let today = now.with_timezone(&tz).date_naive();

	today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
}

fn parse_time(s: &str) -> Result<NaiveTime, SlotErrorKind> {
	NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| SlotErrorKind::Time(s.to_string()))
}

fn localize(date_time: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, SlotErrorKind> {
	tz.from_local_datetime(&date_time)
		.earliest()
		.ok_or(SlotErrorKind::Nonexistent(date_time, tz))
}

fn weekly_rule(day: Weekday, until: Option<NaiveDate>, tz: Tz) -> String {
	let mut rule = RRule::new(Frequency::Weekly).by_weekday(vec![NWeekday::Every(day)]);

	// UNTIL must be UTC when DTSTART carries a TZID
	if let Some(until) = until
		.and_then(|date| date.and_hms_opt(23, 59, 59))
		.and_then(|end| tz.from_local_datetime(&end).earliest())
	{
		rule = rule.until(until.with_timezone(&rrule::Tz::Tz(chrono_tz::UTC)));
	}

	rule.to_string()
}

fn slot_uid(course: &str, day: Weekday, start: NaiveTime) -> String {
	let course = course
		.chars()
		.filter(|c| c.is_ascii_alphanumeric())
		.collect::<String>()
		.to_lowercase();

	format!(
		"class-{course}-{}-{}@canvas2ics",
		day.to_string().to_lowercase(),
		start.format("%H%M")
	)
}

fn slot_event(
	entry: &ClassScheduleEntry,
	monday: NaiveDate,
	day: Weekday,
	times: &[String],
	tz: Tz,
) -> Result<CalendarEvent, SlotErrorKind> {
	let [start, end] = times else {
		return Err(SlotErrorKind::Arity(times.len()));
	};

	let start = parse_time(start)?;
	let end = parse_time(end)?;

	if end <= start {
		return Err(SlotErrorKind::EndsBeforeStart { start, end });
	}

	let date = monday + Duration::days(i64::from(day.num_days_from_monday()));

	let mut description = format!(
		"Weekly class | {day} {}-{}",
		start.format("%H:%M"),
		end.format("%H:%M")
	);

	if !entry.sections.is_empty() {
		description.push_str(&format!(" | Sections: {}", entry.sections.join(", ")));
	}

	Ok(CalendarEvent {
		uid: slot_uid(&entry.course, day, start),
		summary: format!("🏫 {}", entry.course),
		description,
		url: None,
		start: EventTime::Timed(localize(date.and_time(start), tz)?),
		end: Some(EventTime::Timed(localize(date.and_time(end), tz)?)),
		recurrence: Some(weekly_rule(day, entry.until, tz)),
	})
}

/// Builds one weekly recurring event per (day, time slot) of every entry,
/// with the first occurrence in the week containing `reference_now`.
///
/// Every slot is handled on its own, so a bad slot only fails itself.
#[must_use]
pub fn weekly_slots<T: TimeZone>(
	schedule: &[ClassScheduleEntry],
	reference_now: &DateTime<T>,
	tz: Tz,
) -> Vec<Result<CalendarEvent, SlotError>> {
	let monday = week_start(reference_now, tz);
	let mut slots = Vec::new();

	for entry in schedule {
		for &day in &entry.days {
			for (slot, times) in entry.times.iter().enumerate() {
				slots.push(
					slot_event(entry, monday, day, times, tz).map_err(|kind| SlotError {
						course: entry.course.clone(),
						day,
						slot,
						kind,
					}),
				);
			}
		}
	}

	slots
}

/// Like [`weekly_slots`], logging and dropping the slots that fail.
#[must_use]
pub fn generate_weekly_events<T: TimeZone>(
	schedule: &[ClassScheduleEntry],
	reference_now: &DateTime<T>,
	tz: Tz,
) -> Vec<CalendarEvent> {
	weekly_slots(schedule, reference_now, tz)
		.into_iter()
		.filter_map(|slot| {
			slot.map_err(|error| warn!(%error, "skipping timetable slot"))
				.ok()
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use chrono::{Timelike, Utc};

	use super::*;

	const TZ: Tz = chrono_tz::America::Toronto;

	fn entry(days: &[Weekday], times: &[[&str; 2]]) -> ClassScheduleEntry {
		ClassScheduleEntry {
			course: "CS 492".to_string(),
			days: days.to_vec(),
			times: times
				.iter()
				.map(|pair| pair.iter().map(|t| (*t).to_string()).collect())
				.collect(),
			sections: Vec::new(),
			until: None,
		}
	}

	fn wednesday_noon_utc() -> DateTime<Utc> {
		// Wednesday 2025-02-05, 07:00 in Toronto
		Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap()
	}

	fn timed(time: EventTime) -> DateTime<Tz> {
		match time {
			EventTime::Timed(date_time) => date_time,
			EventTime::AllDay(date) => panic!("expected a timed event, got {date}"),
		}
	}

	#[test]
	fn one_recurring_event_per_day_and_slot() {
		let schedule = [entry(&[Weekday::Mon, Weekday::Wed], &[["09:00", "10:30"]])];
		let events = generate_weekly_events(&schedule, &wednesday_noon_utc(), TZ);

		assert_eq!(events.len(), 2);

		let rules = events
			.iter()
			.map(|event| event.recurrence.clone().unwrap())
			.collect::<Vec<_>>();
		assert!(rules[0].contains("FREQ=WEEKLY"));
		assert!(rules[0].contains("BYDAY=MO"));
		assert!(rules[1].contains("BYDAY=WE"));

		for event in &events {
			let start = timed(event.start);
			let end = timed(event.end.unwrap());

			assert_eq!(start.timezone(), TZ);
			assert_eq!((start.hour(), start.minute()), (9, 0));
			assert_eq!((end.hour(), end.minute()), (10, 30));
		}

		assert_eq!(timed(events[0].start).date_naive(), NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
		assert_eq!(timed(events[1].start).date_naive(), NaiveDate::from_ymd_opt(2025, 2, 5).unwrap());
		// 09:00 EST is 14:00 UTC
		assert_eq!(timed(events[0].start).with_timezone(&Utc).hour(), 14);
	}

	#[test]
	fn week_is_taken_in_the_configured_timezone() {
		// Monday 02:00 UTC is still Sunday evening in Toronto
		let now = Utc.with_ymd_and_hms(2025, 2, 3, 2, 0, 0).unwrap();

		assert_eq!(week_start(&now, TZ), NaiveDate::from_ymd_opt(2025, 1, 27).unwrap());
		assert_eq!(week_start(&now, chrono_tz::UTC), NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
	}

	#[test]
	fn first_occurrence_is_in_the_current_week() {
		let schedule = [entry(&[Weekday::Sun, Weekday::Mon], &[["18:00", "19:00"]])];
		let now = wednesday_noon_utc();
		let monday = week_start(&now, TZ);

		for event in generate_weekly_events(&schedule, &now, TZ) {
			let date = timed(event.start).date_naive();

			assert!(date >= monday && date < monday + Duration::days(7));
		}
	}

	#[test]
	fn bad_slot_does_not_affect_others() {
		let schedule = [entry(
			&[Weekday::Tue],
			&[["9am", "10:00"], ["13:00", "14:00"], ["15:00", "14:00"]],
		)];
		let slots = weekly_slots(&schedule, &wednesday_noon_utc(), TZ);

		assert_eq!(slots.len(), 3);
		assert_eq!(
			slots[0].as_ref().unwrap_err().kind,
			SlotErrorKind::Time("9am".to_string())
		);
		assert!(slots[1].is_ok());
		assert!(matches!(
			slots[2].as_ref().unwrap_err().kind,
			SlotErrorKind::EndsBeforeStart { .. }
		));

		assert_eq!(generate_weekly_events(&schedule, &wednesday_noon_utc(), TZ).len(), 1);
	}

	#[test]
	fn wrong_arity_is_a_slot_error() {
		let mut schedule = entry(&[Weekday::Fri], &[]);
		schedule.times = vec![vec!["09:00".to_string()]];

		let slots = weekly_slots(&[schedule], &wednesday_noon_utc(), TZ);

		assert_eq!(slots[0].as_ref().unwrap_err().kind, SlotErrorKind::Arity(1));
	}

	#[test]
	fn nonexistent_local_time_is_a_slot_error() {
		// clocks jump from 02:00 to 03:00 on Sunday 2025-03-09 in Toronto
		let schedule = [entry(&[Weekday::Sun], &[["02:30", "03:30"]])];
		let now = Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap();

		let slots = weekly_slots(&schedule, &now, TZ);

		assert!(matches!(
			slots[0].as_ref().unwrap_err().kind,
			SlotErrorKind::Nonexistent(..)
		));
	}

	#[test]
	fn until_bounds_the_recurrence() {
		let mut schedule = entry(&[Weekday::Thu], &[["11:30", "12:50"]]);
		schedule.until = NaiveDate::from_ymd_opt(2025, 4, 25);
		schedule.sections = vec!["L2".to_string()];

		let events = generate_weekly_events(&[schedule], &wednesday_noon_utc(), TZ);
		let rule = events[0].recurrence.as_deref().unwrap();

		assert!(rule.contains("BYDAY=TH"));
		assert!(rule.contains("UNTIL=20250426T035959Z"));
		assert!(events[0].description.contains("Sections: L2"));
	}

	#[test]
	fn uids_are_stable() {
		let schedule = [entry(&[Weekday::Mon], &[["09:00", "10:30"]])];
		let first = generate_weekly_events(&schedule, &wednesday_noon_utc(), TZ);
		let later = generate_weekly_events(
			&schedule,
			&(wednesday_noon_utc() + Duration::days(30)),
			TZ,
		);

		assert_eq!(first[0].uid, "class-cs492-mon-0900@canvas2ics");
		assert_eq!(first[0].uid, later[0].uid);
	}
}
