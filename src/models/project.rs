//! Project document stored in `config/project.json`.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::contributor::Contributor;

/// Collection-level information used in metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub symbol: String,
    pub description: String,
    /// Planned number of editions in the full collection
    pub total_size: u64,
    pub created_date: String,
    pub last_modified: String,
}

impl ProjectInfo {
    pub fn new(name: impl Into<String>, total_size: u64) -> Self {
        let name = name.into();
        let now = format_timestamp(SystemTime::now());
        Self {
            symbol: name.chars().take(10).collect::<String>().to_uppercase(),
            description: "A collaborative generative collection by multiple contributors"
                .to_string(),
            name,
            total_size,
            created_date: now.clone(),
            last_modified: now,
        }
    }
}

fn default_max_attempts() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

/// Per-project generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Samples tried per edition before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Reject combinations already present in the ledger
    #[serde(default = "default_true")]
    pub ensure_uniqueness: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts(), ensure_uniqueness: true }
    }
}

/// Edition counter and statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    /// Last edition number issued; 0 before the first
    pub current_edition: u64,
    pub generated_count: u64,
    pub unique_combinations: u64,
}

impl GenerationState {
    /// Edition number the next successful generation will receive.
    pub fn next_edition(&self) -> u64 {
        self.current_edition + 1
    }
}

/// Everything persisted for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub info: ProjectInfo,
    /// Roster, in the order contributors were added
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub state: GenerationState,
}

impl ProjectData {
    pub fn new(info: ProjectInfo) -> Self {
        Self {
            info,
            contributors: Vec::new(),
            settings: GenerationSettings::default(),
            state: GenerationState::default(),
        }
    }

    pub fn contributor(&self, name: &str) -> Option<&Contributor> {
        self.contributors.iter().find(|c| c.name == name)
    }

    pub fn contributor_mut(&mut self, name: &str) -> Option<&mut Contributor> {
        self.contributors.iter_mut().find(|c| c.name == name)
    }

    /// Number of distinct combinations the roster can produce.
    ///
    /// Contributors without layers don't take part; with no layers at all
    /// the answer is 0. Saturates instead of overflowing.
    pub fn possible_combinations(&self) -> u64 {
        let mut counts = self.contributors.iter().filter(|c| c.has_layers()).peekable();
        if counts.peek().is_none() {
            return 0;
        }
        counts.fold(1u64, |acc, c| acc.saturating_mul(c.layers.len() as u64))
    }

    /// Refresh `info.last_modified`.
    pub fn touch(&mut self) {
        self.info.last_modified = format_timestamp(SystemTime::now());
    }
}

/// Format a timestamp as ISO 8601 UTC.
pub fn format_timestamp(time: SystemTime) -> String {
    let duration = time.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = duration.as_secs();

    let days = secs / 86400;
    let remaining = secs % 86400;
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    let (year, month, day) = days_to_ymd(days as i64);

    format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", year, month, day, hours, minutes, seconds)
}

/// Convert days since Unix epoch to year/month/day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    let mut remaining_days = days;
    let mut year = 1970i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let february = if is_leap_year(year) { 29 } else { 28 };
    let days_in_months: [i64; 12] = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut month = 1u32;
    for days_in_month in days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }

    (year, month, remaining_days as u32 + 1)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
