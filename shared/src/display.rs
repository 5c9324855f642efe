//! Formatting shared by everything that shows a hike to a person.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn toggle(self) -> Self {
        match self {
            Locale::En => Locale::Zh,
            Locale::Zh => Locale::En,
        }
    }

    /// Pick the string matching this locale.
    pub fn pick<'a>(self, en: &'a str, zh: &'a str) -> &'a str {
        match self {
            Locale::En => en,
            Locale::Zh => zh,
        }
    }
}

pub fn format_distance(meters: f64) -> String {
    format!("{:.2} km", meters / 1000.0)
}

pub fn format_duration(duration_ms: i64, locale: Locale) -> String {
    let duration_ms = duration_ms.max(0);
    let hours = duration_ms / 3_600_000;
    let minutes = (duration_ms % 3_600_000) / 60_000;
    match locale {
        Locale::En => format!("{hours}h {minutes}m"),
        Locale::Zh => format!("{hours}小时 {minutes}分"),
    }
}

/// Mean moving speed over the whole hike, `None` for zero-length durations.
pub fn average_speed_kmh(distance_m: f64, duration_ms: i64) -> Option<f64> {
    if duration_ms <= 0 {
        return None;
    }
    let hours = duration_ms as f64 / 3_600_000.0;
    Some(distance_m / 1000.0 / hours)
}
