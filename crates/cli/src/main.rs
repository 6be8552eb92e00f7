#![warn(clippy::pedantic)]

use std::{fs, fs::File, io::Write, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use canvas2ics_core::{
	client::{CanvasClient, CanvasConfig},
	collect_events, to_calendar, SyncOptions, TimetableConfig,
};
use chrono_tz::Tz;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Longest look-back or look-ahead window accepted, about ten years.
const MAX_WINDOW_DAYS: i64 = 3650;

/// Export Canvas assignments, announcements and your weekly class timetable
/// to an iCalendar file.
#[derive(Parser)]
#[command(version, about)]
struct Args {
	/// Root URL of the Canvas instance
	#[arg(long, env = "CANVAS_API_URL", hide_env_values = true)]
	api_url: String,
	/// Canvas access token
	#[arg(long, env = "CANVAS_API_KEY", hide_env_values = true)]
	api_key: String,
	/// Weekly class timetable as JSON
	#[arg(long, env = "CANVAS_TIMETABLE")]
	timetable: Option<String>,
	/// Read the weekly class timetable from a JSON file instead
	#[arg(long, value_hint = clap::ValueHint::FilePath)]
	timetable_file: Option<PathBuf>,
	/// Timezone class times and dates are in
	#[arg(long, env = "CANVAS_TIMEZONE", default_value = "America/Toronto", value_parser = parse_tz)]
	timezone: Tz,
	/// Days of announcements and calendar entries to look back over
	#[arg(long, default_value_t = 14, value_parser = clap::value_parser!(u32).range(..=MAX_WINDOW_DAYS))]
	days_back: u32,
	/// Days of calendar entries to look ahead
	#[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u32).range(..=MAX_WINDOW_DAYS))]
	days_ahead: u32,
	/// HTTP timeout in seconds
	#[arg(long, default_value_t = 30)]
	timeout: u64,
	/// Write the calendar here instead of stdout
	#[arg(short, long, value_hint = clap::ValueHint::FilePath)]
	output: Option<PathBuf>,
	/// Log debug output
	#[arg(short, long)]
	verbose: bool,
}

fn parse_tz(s: &str) -> Result<Tz, String> {
	s.parse::<Tz>().map_err(|e| e.to_string())
}

fn load_timetable(args: &Args) -> TimetableConfig {
	if let Some(path) = &args.timetable_file {
		return match fs::read_to_string(path) {
			Ok(json) => TimetableConfig::from_json_or_default(&json),
			Err(error) => {
				warn!(path = %path.display(), %error, "could not read timetable, using an empty one");
				TimetableConfig::default()
			}
		};
	}

	args.timetable
		.as_deref()
		.map(TimetableConfig::from_json_or_default)
		.unwrap_or_default()
}

fn main() -> Result<()> {
	dotenvy::dotenv().ok();

	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			EnvFilter::new(if args.verbose { "debug" } else { "info" })
		}))
		.with_writer(std::io::stderr)
		.init();

	if args.api_url.trim().is_empty() || args.api_key.trim().is_empty() {
		bail!("CANVAS_API_URL and CANVAS_API_KEY must both be set");
	}

	let config = load_timetable(&args);
	info!(courses = config.entries().len(), "loaded timetable");

	let client = CanvasClient::new(&CanvasConfig {
		base_url: args.api_url.clone(),
		token: args.api_key.clone(),
		timeout: Duration::from_secs(args.timeout),
	})
	.context("could not set up the Canvas client")?;

	let options = SyncOptions {
		days_back: args.days_back,
		days_ahead: args.days_ahead,
		..SyncOptions::new(args.timezone, chrono::Utc::now())
	};

	let report = collect_events(&client, &config, &options);

	if let Some(error) = report.fatal {
		return Err(error).context("could not fetch courses from Canvas, no calendar written");
	}

	let calendar = to_calendar(&report.events, args.timezone);

	if let Some(output) = &args.output {
		let mut file = File::create(output)
			.with_context(|| format!("could not create {}", output.display()))?;
		write!(&mut file, "{calendar}")
			.with_context(|| format!("could not write {}", output.display()))?;
	} else {
		write!(&mut std::io::stdout(), "{calendar}").context("could not write to stdout")?;
	}

	info!(
		events = report.events.len(),
		skipped = report.skipped.len(),
		"calendar written"
	);

	Ok(())
}
