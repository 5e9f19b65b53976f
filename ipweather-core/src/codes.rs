//! WMO weather-code table.
//!
//! Maps the numeric `weather_code` reported by Open-Meteo, together with its
//! day/night flag, to a human-readable description and an icon URL.

use serde::Deserialize;
use std::{collections::HashMap, sync::OnceLock};

use crate::{
    error::{Error, Result},
    model::WeatherCondition,
};

const BUNDLED_CODES: &str = include_str!("weather_codes.json");

#[derive(Debug, Clone, Deserialize)]
struct CodeEntry {
    day: WeatherCondition,
    night: WeatherCondition,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherCodeTable {
    codes: HashMap<i32, CodeEntry>,
}

impl WeatherCodeTable {
    /// Parse a `{"<code>": {"day": {..}, "night": {..}}}` document.
    ///
    /// Keys that are not integers are skipped.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, CodeEntry> = serde_json::from_str(json).map_err(Error::CodeTable)?;

        let codes = raw
            .into_iter()
            .filter_map(|(key, entry)| key.trim().parse::<i32>().ok().map(|code| (code, entry)))
            .collect();

        Ok(Self { codes })
    }

    /// The table shipped with the crate, parsed on first use.
    ///
    /// If the bundled resource fails to parse, the error is logged once and an
    /// empty table is kept for the rest of the process, so every lookup misses.
    pub fn bundled() -> &'static WeatherCodeTable {
        static TABLE: OnceLock<WeatherCodeTable> = OnceLock::new();

        TABLE.get_or_init(|| match Self::from_json(BUNDLED_CODES) {
            Ok(table) => {
                tracing::debug!(codes = table.len(), "Loaded weather code table");
                table
            }
            Err(e) => {
                tracing::error!("Bundled weather code table is unusable: {e}");
                Self::default()
            }
        })
    }

    pub fn lookup(&self, code: i32, is_day: bool) -> Option<&WeatherCondition> {
        self.codes
            .get(&code)
            .map(|entry| if is_day { &entry.day } else { &entry.night })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Barrier, thread};

    #[test]
    fn bundled_table_resolves_every_code_day_and_night() {
        let table = WeatherCodeTable::bundled();
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(BUNDLED_CODES).unwrap();
        assert_eq!(table.len(), raw.len());

        for code in raw.keys().map(|key| key.parse::<i32>().unwrap()) {
            for is_day in [true, false] {
                let cond = table.lookup(code, is_day).expect("listed code must resolve");
                assert!(!cond.description.is_empty(), "code {code} has no description");
                assert!(!cond.image.is_empty(), "code {code} has no image");
            }
        }
    }

    #[test]
    fn bundled_table_distinguishes_day_and_night() {
        let table = WeatherCodeTable::bundled();
        assert_eq!(table.lookup(0, true).unwrap().description, "Sunny");
        assert_eq!(table.lookup(0, false).unwrap().description, "Clear");
    }

    #[test]
    fn absent_code_is_not_found() {
        let table = WeatherCodeTable::bundled();
        assert!(table.lookup(4, true).is_none());
        assert!(table.lookup(-1, false).is_none());
        assert!(table.lookup(1000, true).is_none());
    }

    #[test]
    fn bundled_returns_the_same_instance() {
        let a = WeatherCodeTable::bundled() as *const _;
        let b = WeatherCodeTable::bundled() as *const _;
        assert_eq!(a, b);
    }

    #[test]
    fn concurrent_first_callers_share_one_table() {
        const THREADS: usize = 8;
        let barrier = Barrier::new(THREADS);

        let addrs: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        WeatherCodeTable::bundled() as *const WeatherCodeTable as usize
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(addrs.iter().all(|&addr| addr == addrs[0]));
        assert!(!WeatherCodeTable::bundled().is_empty());
    }

    #[test]
    fn non_numeric_keys_are_skipped() {
        let json = r#"{
            "1": {"day": {"description": "Bright", "image": "d.png"},
                  "night": {"description": "Dark", "image": "n.png"}},
            "notes": {"day": {"description": "x", "image": "x"},
                      "night": {"description": "y", "image": "y"}}
        }"#;

        let table = WeatherCodeTable::from_json(json).expect("valid table");
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(1, false).unwrap().description, "Dark");
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = WeatherCodeTable::from_json("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, Error::CodeTable(_)));
    }

    #[test]
    fn empty_table_misses_everything() {
        let table = WeatherCodeTable::default();
        assert!(table.lookup(0, true).is_none());
    }
}
