//! Output filename generation.
//!
//! The original tooling grew three incompatible filename conventions; they are
//! consolidated here behind one configurable [`NamingStrategy`]. Whatever the
//! preferred strategy, a name can always be produced: missing inputs fall back
//! season/episode → air date → source id, so an unmatched item still gets a
//! deterministic name.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// "Show Name - S01E02 - Episode Title"
    #[default]
    SeasonEpisode,
    /// "Show Name - 2024-05-17 - Episode Title"
    AirDate,
    /// "Show Name - 4032087 - Episode Title"
    SourceId,
}

/// Inputs available when naming one download.
#[derive(Debug, Clone)]
pub struct NamingInput<'a> {
    pub show_name: &'a str,
    pub title: &'a str,
    pub source_id: &'a str,
    pub label: Option<&'a str>,
    pub air_date: Option<NaiveDate>,
}

/// Parse an `SxxEyy` label into (season, episode) numbers.
pub fn parse_label(label: &str) -> Option<(u32, u32)> {
    let rest = label.strip_prefix(['S', 's'])?;
    let split = rest.find(['E', 'e'])?;
    let season = rest[..split].parse().ok()?;
    let episode = rest[split + 1..].parse().ok()?;
    Some((season, episode))
}

/// Produce the stem (no extension) for a download, honoring the configured
/// strategy with fallbacks when its inputs are missing.
pub fn file_stem(strategy: NamingStrategy, input: &NamingInput<'_>) -> String {
    let middle = match strategy {
        NamingStrategy::SeasonEpisode => input
            .label
            .and_then(parse_label)
            .map(|(s, e)| format!("S{:02}E{:02}", s, e))
            .or_else(|| input.air_date.map(|d| d.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| input.source_id.to_string()),
        NamingStrategy::AirDate => input
            .air_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| input.source_id.to_string()),
        NamingStrategy::SourceId => input.source_id.to_string(),
    };

    sanitize(&format!(
        "{} - {} - {}",
        input.show_name, middle, input.title
    ))
}

/// Strip characters that are unsafe in filenames across platforms.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
