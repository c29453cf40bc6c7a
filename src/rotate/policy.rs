//! Per-table rotation policy.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::config::RotationConfig;

/// A set of table names taken from configuration.
///
/// Accepts the literal `"all"`, a JSON list of names, or a single string with
/// one name per line (commas are accepted as separators too).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSelection")]
pub enum TableSelection {
    #[default]
    None,
    All,
    Tables(BTreeSet<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Text(String),
    List(Vec<String>),
}

impl From<RawSelection> for TableSelection {
    fn from(raw: RawSelection) -> Self {
        match raw {
            RawSelection::Text(text) if text.trim().eq_ignore_ascii_case("all") => {
                TableSelection::All
            }
            RawSelection::Text(text) => {
                TableSelection::from_names(text.split(|c| c == '\n' || c == ','))
            }
            RawSelection::List(names) => TableSelection::from_names(names.iter()),
        }
    }
}

impl TableSelection {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            TableSelection::None
        } else {
            TableSelection::Tables(names)
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        match self {
            TableSelection::None => false,
            TableSelection::All => true,
            TableSelection::Tables(names) => names.contains(table),
        }
    }
}

/// How grid values are derived from the raw samples of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    /// Linear interpolation between the neighbouring raw samples.
    #[default]
    Interpolate,
    /// Mean of the samples in `(t - resolution, t]`.
    Mean,
    /// Maximum of the samples in `(t - resolution, t]`.
    Max,
    /// Latest sample in `(t - resolution, t]`.
    Last,
}

/// Resampling method configured for `table`.
///
/// When a table is listed under several methods, `max` wins over `last`,
/// which wins over `mean`.
pub fn resample_method(config: &RotationConfig, table: &str) -> ResampleMethod {
    if config.resample_by_max.contains(table) {
        ResampleMethod::Max
    } else if config.resample_by_last.contains(table) {
        ResampleMethod::Last
    } else if config.resample_by_mean.contains(table) {
        ResampleMethod::Mean
    } else {
        ResampleMethod::Interpolate
    }
}

/// Whether `table` is trimmed instead of resampled.
pub fn should_trim(config: &RotationConfig, table: &str) -> bool {
    config.tables_to_trim.contains(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn parse(json: &str) -> TableSelection {
        serde_json::from_str(json).expect("selection")
    }

    #[test]
    fn selection_forms() {
        assert_eq!(parse("\"all\""), TableSelection::All);
        assert_eq!(parse("\" ALL \""), TableSelection::All);
        assert_eq!(parse("\"\""), TableSelection::None);
        assert_eq!(parse("[]"), TableSelection::None);

        let lines = parse("\"power\\n energy \\n\\n\"");
        assert!(lines.contains("power"));
        assert!(lines.contains("energy"));
        assert!(!lines.contains("all"));

        let list = parse("[\"power\", \"temperature\"]");
        assert_eq!(list, TableSelection::from_names(["temperature", "power"]));
    }

    #[test]
    fn method_precedence() {
        let mut config = RotationConfig::new(Duration::days(30), 15.0);
        assert_eq!(resample_method(&config, "power"), ResampleMethod::Interpolate);

        config.resample_by_mean = TableSelection::All;
        assert_eq!(resample_method(&config, "power"), ResampleMethod::Mean);

        config.resample_by_last = TableSelection::from_names(["power"]);
        assert_eq!(resample_method(&config, "power"), ResampleMethod::Last);
        assert_eq!(resample_method(&config, "energy"), ResampleMethod::Mean);

        config.resample_by_max = TableSelection::from_names(["power"]);
        assert_eq!(resample_method(&config, "power"), ResampleMethod::Max);
    }

    #[test]
    fn trim_selection() {
        let config = RotationConfig::new(Duration::days(30), 15.0)
            .with_tables_to_trim(TableSelection::from_names(["raw_events"]));
        assert!(should_trim(&config, "raw_events"));
        assert!(!should_trim(&config, "power"));
    }
}
