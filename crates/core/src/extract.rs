//! Best-effort date inference from free-form announcement text.
//!
//! Text is first reduced to plain lowercase words, then checked against an
//! ordered list of rules. The first rule that produces a date wins, and when
//! none does the caller's fallback date is returned unchanged.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::{Captures, Regex};
use select::{document::Document, node::Node, predicate};

/// Month names and abbreviations recognised in text, all lowercase.
const MONTHS: &[(&str, u32)] = &[
	("january", 1),
	("jan", 1),
	("february", 2),
	("feb", 2),
	("march", 3),
	("mar", 3),
	("april", 4),
	("apr", 4),
	("may", 5),
	("june", 6),
	("jun", 6),
	("july", 7),
	("jul", 7),
	("august", 8),
	("aug", 8),
	("september", 9),
	("sept", 9),
	("sep", 9),
	("october", 10),
	("oct", 10),
	("november", 11),
	("nov", 11),
	("december", 12),
	("dec", 12),
];

/// A month mentioned earlier in the year than the fallback month by more
/// than this many months is taken to mean next year.
const YEAR_ROLLOVER_MONTHS: i64 = 6;

static NEXT_CLASS: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\bnext\s+(?:class|lecture)\b").unwrap());

/// "february 3", "feb. 3rd, 2025"
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(&format!(
		r"\b(?P<month>{})\b\.?\s+(?P<day>\d{{1,2}})(?:st|nd|rd|th)?\b(?:(?:,\s*|\s+)(?P<year>\d{{4}})\b)?",
		month_alternation()
	))
	.unwrap()
});

/// "3 february", "3rd of feb 2025"
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(&format!(
		r"\b(?P<day>\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?(?P<month>{})\b\.?(?:(?:,\s*|\s+)(?P<year>\d{{4}})\b)?",
		month_alternation()
	))
	.unwrap()
});

/// Day/month matchers, in priority order for mentions starting at the same
/// position.
static DAY_MONTH_MATCHERS: [&LazyLock<Regex>; 2] = [&MONTH_DAY, &DAY_MONTH];

fn month_alternation() -> String {
	let mut names = MONTHS.iter().map(|(name, _)| *name).collect::<Vec<_>>();

	// longest first so "sept" is not cut short by "sep"
	names.sort_by_key(|name| std::cmp::Reverse(name.len()));
	names.join("|")
}

fn month_number(name: &str) -> Option<u32> {
	MONTHS
		.iter()
		.find(|(month, _)| *month == name)
		.map(|(_, number)| *number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
	/// Resolved from a "next class" phrase against the class days.
	NextClass,
	/// A day and month with an explicit year.
	Explicit,
	/// A day and month, year inferred from the fallback date.
	Implied,
	/// Nothing usable was found.
	Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredDate {
	pub date: NaiveDate,
	pub source: DateSource,
}

impl InferredDate {
	fn fallback(date: NaiveDate) -> Self {
		Self {
			date,
			source: DateSource::Fallback,
		}
	}
}

/// A day/month mention found in text, before it is resolved to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mention {
	position: usize,
	month: u32,
	day: u32,
	year: Option<i32>,
}

impl Mention {
	fn from_captures(caps: &Captures) -> Option<Self> {
		let whole = caps.get(0)?;

		Some(Self {
			position: whole.start(),
			month: month_number(caps.name("month")?.as_str())?,
			day: caps.name("day")?.as_str().parse().ok()?,
			year: caps.name("year").and_then(|year| year.as_str().parse().ok()),
		})
	}

	fn resolve(self, fallback: NaiveDate) -> InferredDate {
		let (year, source) = match self.year {
			Some(year) => (year, DateSource::Explicit),
			None => {
				let behind = i64::from(fallback.month()) - i64::from(self.month);
				let year = if behind > YEAR_ROLLOVER_MONTHS {
					fallback.year() + 1
				} else {
					fallback.year()
				};

				(year, DateSource::Implied)
			}
		};

		NaiveDate::from_ymd_opt(year, self.month, self.day)
			.map_or(InferredDate::fallback(fallback), |date| InferredDate {
				date,
				source,
			})
	}
}

/// Elements whose boundaries separate words.
const BLOCK_ELEMENTS: &[&str] = &[
	"address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
	"figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
	"ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

fn push_text(node: Node<'_>, out: &mut String) {
	if let Some(text) = node.as_text() {
		out.push_str(text);
		return;
	}

	match node.name() {
		Some("script" | "style") | None => {}
		Some(name) => {
			let block = BLOCK_ELEMENTS.contains(&name);

			if block {
				out.push(' ');
			}
			for child in node.children() {
				push_text(child, out);
			}
			if block {
				out.push(' ');
			}
		}
	}
}

/// Strips HTML markup and collapses every run of whitespace, including
/// non-breaking spaces, into a single space. Inline tags do not split the
/// words they sit in.
#[must_use]
pub fn plain_text(html: &str) -> String {
	let document = Document::from(html);
	let mut text = String::new();

	for root in document.find(predicate::Any).filter(|node| node.parent().is_none()) {
		push_text(root, &mut text);
	}

	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the next class day strictly after `from`, wrapping into the
/// following week.
#[must_use]
pub fn next_class_day(from: NaiveDate, class_days: &[Weekday]) -> Option<NaiveDate> {
	let today = from.weekday().num_days_from_monday();

	class_days
		.iter()
		.map(|day| match (day.num_days_from_monday() + 7 - today) % 7 {
			0 => 7,
			ahead => ahead,
		})
		.min()
		.map(|ahead| from + Duration::days(i64::from(ahead)))
}

fn first_mention(text: &str) -> Option<Mention> {
	DAY_MONTH_MATCHERS
		.iter()
		.filter_map(|matcher| matcher.captures(text))
		.filter_map(|caps| Mention::from_captures(&caps))
		// min_by_key keeps the first of equal positions
		.min_by_key(|mention| mention.position)
}

/// Infers the date a piece of text refers to, recording which rule produced
/// it. Never fails: anything unrecognised resolves to `fallback`.
#[must_use]
pub fn infer_date(text: &str, fallback: NaiveDate, class_days: &[Weekday]) -> InferredDate {
	let text = plain_text(text).to_lowercase();

	if !class_days.is_empty() && NEXT_CLASS.is_match(&text) {
		if let Some(date) = next_class_day(fallback, class_days) {
			return InferredDate {
				date,
				source: DateSource::NextClass,
			};
		}
	}

	first_mention(&text).map_or(InferredDate::fallback(fallback), |mention| {
		mention.resolve(fallback)
	})
}

#[must_use]
pub fn extract_date(text: &str, fallback: NaiveDate, class_days: &[Weekday]) -> NaiveDate {
	infer_date(text, fallback, class_days).date
}

#[cfg(test)]
mod tests {
	use super::*;

	fn date(year: i32, month: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(year, month, day).unwrap()
	}

	// 2025-02-03 is a Monday
	const MONDAY: (i32, u32, u32) = (2025, 2, 3);

	fn monday() -> NaiveDate {
		date(MONDAY.0, MONDAY.1, MONDAY.2)
	}

	#[test]
	fn plain_text_strips_markup_and_nbsp() {
		let text = plain_text("<p>Quiz&nbsp;on\u{a0}\u{a0}<b>March</b>\n\n 4</p><script>var x = 1;</script>");

		assert_eq!(text, "Quiz on March 4");
	}

	#[test]
	fn inline_tags_keep_words_whole() {
		assert_eq!(plain_text("Due <b>Feb</b>ruary 10"), "Due February 10");
		assert_eq!(plain_text("<p>Quiz</p><p>Monday</p>one<br>two"), "Quiz Monday one two");
		assert_eq!(
			infer_date("Due <b>Feb</b>ruary 10", monday(), &[Weekday::Wed]),
			InferredDate {
				date: date(2025, 2, 10),
				source: DateSource::Implied,
			}
		);
	}

	#[test]
	fn explicit_year_wins_regardless_of_fallback() {
		let fallback = date(2019, 11, 20);

		assert_eq!(extract_date("Exam on February 3, 2025", fallback, &[]), date(2025, 2, 3));
		assert_eq!(extract_date("Exam on 3rd February 2025", fallback, &[]), date(2025, 2, 3));
		assert_eq!(
			infer_date("Exam on February 3rd,2025", fallback, &[]).source,
			DateSource::Explicit
		);
		assert_eq!(extract_date("Exam on February 3rd,2025", fallback, &[]), date(2025, 2, 3));

		let inferred = infer_date("due Feb 3 2025", fallback, &[]);
		assert_eq!(inferred.source, DateSource::Explicit);
	}

	#[test]
	fn ordinal_suffixes() {
		let fallback = date(2025, 1, 10);

		assert_eq!(extract_date("due March 1st", fallback, &[]), date(2025, 3, 1));
		assert_eq!(extract_date("due March 2nd", fallback, &[]), date(2025, 3, 2));
		assert_eq!(extract_date("due 23rd March", fallback, &[]), date(2025, 3, 23));
		assert_eq!(extract_date("due the 14th of March", fallback, &[]), date(2025, 3, 14));
	}

	#[test]
	fn abbreviated_and_mixed_case_months() {
		let fallback = date(2025, 9, 1);

		assert_eq!(extract_date("Quiz: SEPT 12", fallback, &[]), date(2025, 9, 12));
		assert_eq!(extract_date("Quiz: Sep. 12", fallback, &[]), date(2025, 9, 12));
		assert_eq!(extract_date("quiz: oCtObEr 2", fallback, &[]), date(2025, 10, 2));
		assert_eq!(extract_date("Quiz 5 Nov", fallback, &[]), date(2025, 11, 5));
	}

	#[test]
	fn missing_year_defaults_to_fallback_year() {
		let inferred = infer_date("Assignment due April 9", date(2025, 3, 1), &[]);

		assert_eq!(inferred.date, date(2025, 4, 9));
		assert_eq!(inferred.source, DateSource::Implied);
	}

	#[test]
	fn december_post_about_january_rolls_into_next_year() {
		let fallback = date(2024, 12, 15);

		assert_eq!(extract_date("Final exam January 8", fallback, &[]), date(2025, 1, 8));
		// six months behind is not enough to roll over
		assert_eq!(extract_date("see June 8", fallback, &[]), date(2024, 6, 8));
	}

	#[test]
	fn impossible_day_falls_back() {
		let fallback = date(2025, 4, 2);

		assert_eq!(extract_date("due April 31", fallback, &[]), fallback);
		assert_eq!(extract_date("due February 30, 2025", fallback, &[]), fallback);
	}

	#[test]
	fn no_pattern_returns_fallback() {
		let fallback = date(2025, 4, 2);
		let inferred = infer_date("Office hours are cancelled this week.", fallback, &[]);

		assert_eq!(inferred, InferredDate::fallback(fallback));
		assert_eq!(extract_date("", fallback, &[Weekday::Mon]), fallback);
		// a bare year or number is not a date
		assert_eq!(extract_date("chapter 12 of the 2025 edition", fallback, &[]), fallback);
	}

	#[test]
	fn first_mention_in_text_wins() {
		let fallback = date(2025, 1, 10);

		assert_eq!(
			extract_date("moved from 3 February to February 10", fallback, &[]),
			date(2025, 2, 3)
		);
		assert_eq!(
			extract_date("moved from February 10 to 3 February", fallback, &[]),
			date(2025, 2, 10)
		);
	}

	#[test]
	fn next_class_later_in_same_week() {
		let found = infer_date("Bring your laptop next class", monday(), &[Weekday::Wed]);

		assert_eq!(found.date, date(2025, 2, 5));
		assert_eq!(found.source, DateSource::NextClass);
	}

	#[test]
	fn next_class_on_same_weekday_wraps_a_week() {
		assert_eq!(
			extract_date("Quiz next class", monday(), &[Weekday::Mon]),
			date(2025, 2, 10)
		);
	}

	#[test]
	fn next_lecture_wraps_to_earliest_day_of_following_week() {
		let friday = date(2025, 2, 7);

		assert_eq!(
			extract_date("Next Lecture is online", friday, &[Weekday::Wed, Weekday::Mon]),
			date(2025, 2, 10)
		);
	}

	#[test]
	fn next_class_beats_explicit_dates() {
		assert_eq!(
			extract_date("Next class (February 20) we review", monday(), &[Weekday::Thu]),
			date(2025, 2, 6)
		);
	}

	#[test]
	fn next_class_without_class_days_is_skipped() {
		assert_eq!(extract_date("see you next class", monday(), &[]), monday());
		assert_eq!(
			extract_date("next class, March 3rd", monday(), &[]),
			date(2025, 3, 3)
		);
	}

	#[test]
	fn html_announcements_are_read_as_text() {
		let body = "<p>The midterm is on <strong>Feb</strong>&nbsp;<em>27th</em>.</p>";

		assert_eq!(extract_date(body, monday(), &[]), date(2025, 2, 27));
	}
}
