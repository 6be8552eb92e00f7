//! Enrollment data as returned by the Canvas REST API, and the seam through
//! which it is fetched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
	#[error("invalid base URL {0:?}")]
	BaseUrl(String),
	#[error("request to {url} failed: {message}")]
	Request { url: String, message: String },
	#[error("{url} returned HTTP {status}")]
	Status { url: String, status: u16 },
	#[error("could not decode response from {url}: {message}")]
	Decode { url: String, message: String },
	#[error("no data for course {0}")]
	UnknownCourse(u64),
}

impl SourceError {
	/// Whether the source as a whole is unusable: it cannot be reached, or
	/// it rejects the credentials.
	#[must_use]
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::BaseUrl(_) | Self::Request { .. } | Self::Status { status: 401 | 403, .. }
		)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
	pub id: u64,
	/// Missing on courses the user can no longer access.
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub course_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub due_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
	pub id: u64,
	pub title: String,
	/// HTML body.
	#[serde(default)]
	pub message: String,
	#[serde(default)]
	pub posted_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub url: Option<String>,
}

/// An entry on the user's own Canvas calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
	pub id: u64,
	pub title: String,
	pub start_at: DateTime<Utc>,
	#[serde(default)]
	pub end_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub all_day: bool,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub html_url: Option<String>,
}

/// Where enrollment data comes from.
pub trait CourseSource {
	/// Courses the user is actively enrolled in.
	fn courses(&self) -> Result<Vec<Course>, SourceError>;

	/// Upcoming assignments of a course.
	fn assignments(&self, course_id: u64) -> Result<Vec<Assignment>, SourceError>;

	/// Announcements of a course posted between `start` and `end`.
	fn announcements(
		&self,
		course_id: u64,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Announcement>, SourceError>;

	/// The user's calendar entries between `start` and `end`.
	fn calendar_events(
		&self,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<CalendarEntry>, SourceError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotCourse {
	pub course: Course,
	#[serde(default)]
	pub assignments: Vec<Assignment>,
	#[serde(default)]
	pub announcements: Vec<Announcement>,
}

/// Enrollment data fetched ahead of time, e.g. by a browser extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
	#[serde(default)]
	pub courses: Vec<SnapshotCourse>,
	#[serde(default)]
	pub calendar_events: Vec<CalendarEntry>,
}

impl Snapshot {
	fn course(&self, course_id: u64) -> Result<&SnapshotCourse, SourceError> {
		self.courses
			.iter()
			.find(|course| course.course.id == course_id)
			.ok_or(SourceError::UnknownCourse(course_id))
	}
}

impl CourseSource for Snapshot {
	fn courses(&self) -> Result<Vec<Course>, SourceError> {
		Ok(self.courses.iter().map(|course| course.course.clone()).collect())
	}

	fn assignments(&self, course_id: u64) -> Result<Vec<Assignment>, SourceError> {
		Ok(self.course(course_id)?.assignments.clone())
	}

	fn announcements(
		&self,
		course_id: u64,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Announcement>, SourceError> {
		Ok(self
			.course(course_id)?
			.announcements
			.iter()
			.filter(|announcement| {
				announcement
					.posted_at
					.map_or(true, |posted| posted >= start && posted <= end)
			})
			.cloned()
			.collect())
	}

	fn calendar_events(
		&self,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<CalendarEntry>, SourceError> {
		Ok(self
			.calendar_events
			.iter()
			.filter(|entry| entry.start_at <= end && entry.end_at.unwrap_or(entry.start_at) >= start)
			.cloned()
			.collect())
	}
}
