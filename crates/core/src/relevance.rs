use std::sync::LazyLock;

use regex::Regex;

/// Lecture, seminar and recitation section codes such as `L2` or `S01`.
static SECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[LSR]\d+\b").unwrap());

/// Section codes mentioned in `text`, uppercased, in order of appearance.
#[must_use]
pub fn mentioned_sections(text: &str) -> Vec<String> {
	let text = text.to_uppercase();

	SECTION
		.find_iter(&text)
		.map(|section| section.as_str().to_string())
		.collect()
}

/// Whether a post concerns one of `my_sections`. Posts that name no section
/// at all are relevant to everyone.
#[must_use]
pub fn is_relevant<S: AsRef<str>>(title: &str, body: &str, my_sections: &[S]) -> bool {
	let mentioned = mentioned_sections(&format!("{title}\n{body}"));

	mentioned.is_empty()
		|| mentioned.iter().any(|section| {
			my_sections
				.iter()
				.any(|mine| mine.as_ref().eq_ignore_ascii_case(section))
		})
}
