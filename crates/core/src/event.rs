use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarDateTime, Component, DatePerhapsTime, Event, EventLike};

/// Name given to the generated calendar.
pub const CALENDAR_NAME: &str = "Canvas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
	AllDay(NaiveDate),
	Timed(DateTime<Tz>),
}

impl EventTime {
	#[must_use]
	pub fn date(&self) -> NaiveDate {
		match self {
			Self::AllDay(date) => *date,
			Self::Timed(date_time) => date_time.date_naive(),
		}
	}
}

impl From<EventTime> for DatePerhapsTime {
	fn from(time: EventTime) -> Self {
		match time {
			EventTime::AllDay(date) => Self::Date(date),
			// written as wall-clock time with a TZID, never as UTC
			EventTime::Timed(date_time) => CalendarDateTime::WithTimezone {
				date_time: date_time.naive_local(),
				tzid: date_time.timezone().name().to_string(),
			}
			.into(),
		}
	}
}

/// A structured event record, independent of the iCalendar encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
	pub uid: String,
	pub summary: String,
	pub description: String,
	pub url: Option<String>,
	pub start: EventTime,
	pub end: Option<EventTime>,
	/// `RRULE` value, e.g. `FREQ=WEEKLY;BYDAY=MO`.
	pub recurrence: Option<String>,
}

impl CalendarEvent {
	/// End of the event as written to the calendar. Timed events without an
	/// explicit end last one hour, all-day events cover their start day.
	#[must_use]
	pub fn effective_end(&self) -> EventTime {
		if let Some(end) = self.end {
			return end;
		}

		match self.start {
			EventTime::AllDay(date) => EventTime::AllDay(date.succ_opt().unwrap_or(date)),
			EventTime::Timed(start) => EventTime::Timed(start + Duration::hours(1)),
		}
	}

	#[must_use]
	pub fn to_ical(&self) -> Event {
		let mut event = Event::new();

		event
			.uid(&self.uid)
			.summary(&self.summary)
			.description(&self.description)
			.starts(self.start)
			.ends(self.effective_end());

		if let Some(url) = &self.url {
			event.add_property("URL", url);
		}

		if let Some(rule) = &self.recurrence {
			event.add_property("RRULE", rule);
		}

		event.done()
	}
}

#[must_use]
pub fn to_calendar(events: &[CalendarEvent], tz: Tz) -> Calendar {
	let mut calendar = Calendar::new();

	calendar.name(CALENDAR_NAME);
	calendar.timezone(tz.name());

	for event in events {
		calendar.push(event.to_ical());
	}

	calendar
}
