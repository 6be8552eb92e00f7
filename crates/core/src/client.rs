//! Blocking client for the Canvas REST API.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{
	blocking::{Client, Response},
	header::{self, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::source::{
	Announcement, Assignment, CalendarEntry, Course, CourseSource, SourceError,
};

/// Page size requested from list endpoints. Canvas caps this at 100.
const PER_PAGE: &str = "100";

#[derive(Clone)]
pub struct CanvasConfig {
	/// Root of the Canvas instance, e.g. `https://canvas.example.edu`.
	pub base_url: String,
	pub token: String,
	pub timeout: Duration,
}

impl std::fmt::Debug for CanvasConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CanvasConfig")
			.field("base_url", &self.base_url)
			.field("token", &"<redacted>")
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl CanvasConfig {
	#[must_use]
	pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			token: token.into(),
			timeout: Duration::from_secs(30),
		}
	}
}

#[derive(Debug)]
pub struct CanvasClient {
	client: Client,
	api: String,
}

fn api_root(base_url: &str) -> Result<String, SourceError> {
	let base = base_url.trim().trim_end_matches('/');
	let base = base.strip_suffix("/api/v1").unwrap_or(base);

	if !(base.starts_with("https://") || base.starts_with("http://")) {
		return Err(SourceError::BaseUrl(base_url.to_string()));
	}

	Ok(format!("{base}/api/v1"))
}

fn timestamp(date_time: DateTime<Utc>) -> String {
	date_time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Target of the `rel="next"` entry of a `Link` header, if any.
fn next_page(response: &Response) -> Option<String> {
	let links = response.headers().get(header::LINK)?.to_str().ok()?;

	links.split(',').find_map(|link| {
		let mut parts = link.split(';');
		let target = parts.next()?.trim();
		let is_next = parts.any(|param| {
			let param = param.trim().replace(' ', "");
			param == "rel=\"next\"" || param == "rel=next"
		});

		is_next
			.then(|| target.strip_prefix('<')?.strip_suffix('>'))
			.flatten()
			.map(str::to_string)
	})
}

impl CanvasClient {
	pub fn new(config: &CanvasConfig) -> Result<Self, SourceError> {
		let api = api_root(&config.base_url)?;

		let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
			.map_err(|_| SourceError::Request {
				url: api.clone(),
				message: "access token contains invalid characters".to_string(),
			})?;
		auth.set_sensitive(true);

		let mut headers = HeaderMap::new();
		headers.insert(header::AUTHORIZATION, auth);

		let client = Client::builder()
			.default_headers(headers)
			.timeout(config.timeout)
			.build()
			.map_err(|e| SourceError::Request {
				url: api.clone(),
				message: e.to_string(),
			})?;

		Ok(Self { client, api })
	}

	fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Response, SourceError> {
		debug!(url, "fetching");

		let response = self
			.client
			.get(url)
			.query(query)
			.send()
			.map_err(|e| SourceError::Request {
				url: url.to_string(),
				message: e.to_string(),
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(SourceError::Status {
				url: url.to_string(),
				status: status.as_u16(),
			});
		}

		Ok(response)
	}

	/// Fetches every page of a list endpoint.
	fn get_all<T: DeserializeOwned>(
		&self,
		path: &str,
		query: &[(&str, String)],
	) -> Result<Vec<T>, SourceError> {
		let mut query = query.to_vec();
		query.push(("per_page", PER_PAGE.to_string()));

		let mut url = format!("{}{path}", self.api);
		let mut items = Vec::new();
		let mut response = self.send(&url, &query)?;

		loop {
			let next = next_page(&response);
			let page: Vec<T> = response.json().map_err(|e| SourceError::Decode {
				url: url.clone(),
				message: e.to_string(),
			})?;

			items.extend(page);

			let Some(next) = next else {
				break;
			};

			// the next link already carries the query string
			url = next;
			response = self.send(&url, &[])?;
		}

		Ok(items)
	}
}

impl CourseSource for CanvasClient {
	#[instrument(skip(self))]
	fn courses(&self) -> Result<Vec<Course>, SourceError> {
		self.get_all("/courses", &[("enrollment_state", "active".to_string())])
	}

	#[instrument(skip(self))]
	fn assignments(&self, course_id: u64) -> Result<Vec<Assignment>, SourceError> {
		self.get_all(
			&format!("/courses/{course_id}/assignments"),
			&[("bucket", "upcoming".to_string())],
		)
	}

	#[instrument(skip(self))]
	fn announcements(
		&self,
		course_id: u64,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Announcement>, SourceError> {
		self.get_all(
			"/announcements",
			&[
				("context_codes[]", format!("course_{course_id}")),
				("start_date", timestamp(start)),
				("end_date", timestamp(end)),
			],
		)
	}

	#[instrument(skip(self))]
	fn calendar_events(
		&self,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<CalendarEntry>, SourceError> {
		self.get_all(
			"/calendar_events",
			&[
				("type", "event".to_string()),
				("start_date", timestamp(start)),
				("end_date", timestamp(end)),
			],
		)
	}
}
