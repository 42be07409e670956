//! Historical festival table used for place and distance lookups.
//!
//! The table is loaded once from a CSV export. For every
//! (region, sub-region, sub-sub-region) key only the most recent row matters,
//! so the winner is resolved while loading.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::ml::persistence::ArtifactError;

/// Number of place-category columns fed to the PCA transform.
pub const NUM_PLACE_FEATURES: usize = 8;

/// Place-category column names, in the order the PCA transform was fitted on.
pub const PLACE_COLUMNS: [&str; NUM_PLACE_FEATURES] = [
    "공원/유원지",
    "관광농원/허브마을",
    "일반관광지",
    "동식물원",
    "먹거리/패션거리",
    "산림욕장/휴향림/수목원",
    "폭포/계곡/호수/저수지",
    "해수욕장",
];

static DISTANCE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("static regex"));

/// Administrative region key: (region, sub-region, sub-sub-region).
pub type RegionKey = (String, String, String);

/// One raw row of the historical CSV export.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "시")]
    region: String,
    #[serde(rename = "군구")]
    sub_region: String,
    #[serde(rename = "법정동")]
    sub_sub_region: String,
    /// Float when the exporting frame had gaps in the column ("2019.0")
    #[serde(rename = "시작년", default)]
    start_year: Option<f64>,
    #[serde(rename = "공원/유원지", default)]
    park: Option<f64>,
    #[serde(rename = "관광농원/허브마을", default)]
    tourist_farm: Option<f64>,
    #[serde(rename = "일반관광지", default)]
    general_attraction: Option<f64>,
    #[serde(rename = "동식물원", default)]
    zoo_garden: Option<f64>,
    #[serde(rename = "먹거리/패션거리", default)]
    food_street: Option<f64>,
    #[serde(rename = "산림욕장/휴향림/수목원", default)]
    forest: Option<f64>,
    #[serde(rename = "폭포/계곡/호수/저수지", default)]
    waterside: Option<f64>,
    #[serde(rename = "해수욕장", default)]
    beach: Option<f64>,
    #[serde(rename = "서울과거리", default)]
    distance_to_capital: Option<String>,
}

/// A cleaned historical record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub start_year: Option<i32>,
    pub place_features: [f64; NUM_PLACE_FEATURES],
    /// Distance to the capital; `None` when the source cell had no number.
    pub distance_to_capital: Option<f64>,
}

impl RawRecord {
    /// Region key, or `None` when any part is blank.
    fn key(&self) -> Option<RegionKey> {
        let parts = [&self.region, &self.sub_region, &self.sub_sub_region];
        if parts.iter().any(|p| p.trim().is_empty()) {
            return None;
        }
        Some((
            self.region.clone(),
            self.sub_region.clone(),
            self.sub_sub_region.clone(),
        ))
    }
}

/// Convert a year cell to an integer year; NaN is a missing year.
fn whole_year(value: f64) -> Result<Option<i32>, String> {
    if value.is_nan() {
        return Ok(None);
    }
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(format!("start year {} is not a whole year", value));
    }
    Ok(Some(value as i32))
}

impl TryFrom<RawRecord> for ReferenceRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let start_year = match raw.start_year {
            Some(value) => whole_year(value)?,
            None => None,
        };

        let place_features = [
            raw.park,
            raw.tourist_farm,
            raw.general_attraction,
            raw.zoo_garden,
            raw.food_street,
            raw.forest,
            raw.waterside,
            raw.beach,
        ]
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0));

        Ok(Self {
            start_year,
            place_features,
            distance_to_capital: raw.distance_to_capital.as_deref().and_then(parse_distance),
        })
    }
}

/// Result of a reference lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceLookup {
    pub place_features: [f64; NUM_PLACE_FEATURES],
    pub distance_to_capital: Option<f64>,
}

impl PlaceLookup {
    /// Value used when a region has no history: no signal, zero distance.
    pub fn no_history() -> Self {
        Self {
            place_features: [0.0; NUM_PLACE_FEATURES],
            distance_to_capital: Some(0.0),
        }
    }
}

/// Read-only historical dataset indexed by region key.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    latest: HashMap<RegionKey, ReferenceRecord>,
    rows: usize,
}

impl ReferenceDataset {
    /// Load the CSV export from disk.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound {
                kind: "reference dataset",
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::Reader::from_path(path).map_err(|e| ArtifactError::Deserialize {
            kind: "reference dataset",
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let deserialize_error = |message: String| ArtifactError::Deserialize {
            kind: "reference dataset",
            path: path.to_path_buf(),
            message,
        };

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for result in reader.deserialize::<RawRecord>() {
            let raw = result.map_err(|e| deserialize_error(e.to_string()))?;
            // A blank location cell never matches a request.
            let Some(key) = raw.key() else {
                skipped += 1;
                continue;
            };
            rows.push((key, ReferenceRecord::try_from(raw).map_err(deserialize_error)?));
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} reference rows with a blank location", skipped);
        }

        Ok(Self::from_records(rows))
    }

    /// Build the index from rows in source order.
    pub fn from_records(records: impl IntoIterator<Item = (RegionKey, ReferenceRecord)>) -> Self {
        let mut latest: HashMap<RegionKey, ReferenceRecord> = HashMap::new();
        let mut rows = 0;

        for (key, record) in records {
            rows += 1;
            match latest.get_mut(&key) {
                // Strictly newer only: equal years keep the earlier row.
                Some(current) if record.start_year > current.start_year => *current = record,
                Some(_) => {}
                None => {
                    latest.insert(key, record);
                }
            }
        }

        Self { latest, rows }
    }

    /// Place features and distance of the most recent record for a region.
    pub fn lookup(&self, region: &str, sub_region: &str, sub_sub_region: &str) -> PlaceLookup {
        let key = (
            region.to_string(),
            sub_region.to_string(),
            sub_sub_region.to_string(),
        );

        match self.latest.get(&key) {
            Some(record) => PlaceLookup {
                place_features: record.place_features,
                distance_to_capital: record.distance_to_capital,
            },
            None => PlaceLookup::no_history(),
        }
    }

    /// Number of rows read from the source table.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of distinct region keys.
    pub fn region_count(&self) -> usize {
        self.latest.len()
    }
}

/// Extract the first number from a free-text distance cell ("123.5km" -> 123.5).
pub fn parse_distance(cell: &str) -> Option<f64> {
    DISTANCE_NUMBER
        .captures(cell)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str = "시,군구,법정동,시작년,예산\n(백만),공원/유원지,관광농원/허브마을,일반관광지,동식물원,먹거리/패션거리,산림욕장/휴향림/수목원,폭포/계곡/호수/저수지,해수욕장,서울과거리";

    fn write_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        // The budget header contains a newline and must be quoted.
        let header = HEADER.replace("예산\n(백만)", "\"예산\n(백만)\"");
        writeln!(file, "{}", header).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    fn key(a: &str, b: &str, c: &str) -> RegionKey {
        (a.to_string(), b.to_string(), c.to_string())
    }

    fn record(year: Option<i32>, first_place: f64, distance: Option<f64>) -> ReferenceRecord {
        let mut place_features = [0.0; NUM_PLACE_FEATURES];
        place_features[0] = first_place;
        ReferenceRecord {
            start_year: year,
            place_features,
            distance_to_capital: distance,
        }
    }

    // ==================== Distance Parsing ====================

    #[test]
    fn test_parse_distance_with_unit() {
        assert_relative_eq!(parse_distance("123.5km").unwrap(), 123.5);
        assert_relative_eq!(parse_distance("약 42 km").unwrap(), 42.0);
    }

    #[test]
    fn test_parse_distance_without_number() {
        assert_eq!(parse_distance("nan"), None);
        assert_eq!(parse_distance(""), None);
    }

    // ==================== Lookup Semantics ====================

    #[test]
    fn test_lookup_miss_returns_zeros() {
        let dataset = ReferenceDataset::default();
        let lookup = dataset.lookup("서울특별시", "종로구", "세종로");

        assert_eq!(lookup.place_features, [0.0; NUM_PLACE_FEATURES]);
        assert_eq!(lookup.distance_to_capital, Some(0.0));
    }

    #[test]
    fn test_lookup_picks_most_recent_year() {
        let dataset = ReferenceDataset::from_records(vec![
            (key("강원도", "춘천시", "신북읍"), record(Some(2017), 1.0, Some(80.0))),
            (key("강원도", "춘천시", "신북읍"), record(Some(2019), 3.0, Some(81.0))),
            (key("강원도", "춘천시", "신북읍"), record(Some(2018), 2.0, Some(82.0))),
        ]);

        let lookup = dataset.lookup("강원도", "춘천시", "신북읍");
        assert_eq!(lookup.place_features[0], 3.0);
        assert_eq!(lookup.distance_to_capital, Some(81.0));
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.region_count(), 1);
    }

    #[test]
    fn test_lookup_tie_keeps_first_row() {
        let dataset = ReferenceDataset::from_records(vec![
            (key("a", "b", "c"), record(Some(2019), 1.0, None)),
            (key("a", "b", "c"), record(Some(2019), 2.0, None)),
        ]);

        assert_eq!(dataset.lookup("a", "b", "c").place_features[0], 1.0);
    }

    #[test]
    fn test_missing_year_ranks_below_any_year() {
        let dataset = ReferenceDataset::from_records(vec![
            (key("a", "b", "c"), record(None, 1.0, None)),
            (key("a", "b", "c"), record(Some(1990), 2.0, None)),
        ]);

        assert_eq!(dataset.lookup("a", "b", "c").place_features[0], 2.0);
    }

    #[test]
    fn test_lookup_propagates_missing_distance() {
        let dataset = ReferenceDataset::from_records(vec![(
            key("a", "b", "c"),
            record(Some(2020), 1.0, None),
        )]);

        assert_eq!(dataset.lookup("a", "b", "c").distance_to_capital, None);
    }

    #[test]
    fn test_lookup_requires_full_key() {
        let dataset = ReferenceDataset::from_records(vec![(
            key("a", "b", "c"),
            record(Some(2020), 5.0, Some(1.0)),
        )]);

        assert_eq!(dataset.lookup("a", "b", "x"), PlaceLookup::no_history());
    }

    // ==================== CSV Loading ====================

    #[test]
    fn test_load_cleans_cells() {
        let file = write_csv(&[
            "경기도,수원시,팔달구,2018,120,1,,2,0,1,,,0,32.4km",
            "경기도,수원시,팔달구,2019,미확정,0,1,,,,,1,,정보없음",
        ]);

        let dataset = ReferenceDataset::load(file.path()).unwrap();
        let lookup = dataset.lookup("경기도", "수원시", "팔달구");

        assert_eq!(lookup.place_features, [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(lookup.distance_to_capital, None);
    }

    #[test]
    fn test_load_extracts_distance() {
        let file = write_csv(&["부산광역시,해운대구,우동,2020,500,1,0,1,0,1,0,0,1,325.7 km"]);

        let dataset = ReferenceDataset::load(file.path()).unwrap();
        let lookup = dataset.lookup("부산광역시", "해운대구", "우동");

        assert_eq!(lookup.place_features, [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(lookup.distance_to_capital.unwrap(), 325.7);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = ReferenceDataset::load(Path::new("/nonexistent/history.csv"));
        assert!(matches!(result, Err(ArtifactError::NotFound { .. })));
    }

    #[test]
    fn test_load_accepts_float_years() {
        let file = write_csv(&[
            "경상북도,안동시,풍천면,2019.0,50,1.0,0,0,0,0,0,0,0,240km",
            "경상북도,안동시,풍천면,,50,9.0,0,0,0,0,0,0,0,1km",
            "경상북도,안동시,풍천면,2018.0,50,2.0,0,0,0,0,0,0,0,2km",
        ]);

        let dataset = ReferenceDataset::load(file.path()).unwrap();
        let lookup = dataset.lookup("경상북도", "안동시", "풍천면");

        assert_eq!(lookup.place_features[0], 1.0);
        assert_eq!(lookup.distance_to_capital, Some(240.0));
    }

    #[test]
    fn test_load_rejects_fractional_year() {
        let file = write_csv(&["a,b,c,2019.5,0,0,0,0,0,0,0,0,0,1"]);
        let result = ReferenceDataset::load(file.path());
        assert!(matches!(result, Err(ArtifactError::Deserialize { .. })));
    }

    #[test]
    fn test_whole_year() {
        assert_eq!(whole_year(2019.0), Ok(Some(2019)));
        assert_eq!(whole_year(f64::NAN), Ok(None));
        assert!(whole_year(2019.25).is_err());
        assert!(whole_year(f64::INFINITY).is_err());
    }

    #[test]
    fn test_load_skips_blank_location_rows() {
        let file = write_csv(&[
            "전라남도,순천시,,2021,10,4,0,0,0,0,0,0,0,300km",
            "전라남도,순천시,조례동,2021,10,1,0,0,0,0,0,0,0,299km",
        ]);

        let dataset = ReferenceDataset::load(file.path()).unwrap();

        assert_eq!(dataset.lookup("전라남도", "순천시", ""), PlaceLookup::no_history());
        assert_eq!(dataset.lookup("전라남도", "순천시", "조례동").place_features[0], 1.0);
        assert_eq!(dataset.region_count(), 1);
    }

    #[test]
    fn test_load_rejects_malformed_year() {
        let file = write_csv(&["a,b,c,two-thousand,0,0,0,0,0,0,0,0,0,1"]);
        let result = ReferenceDataset::load(file.path());
        assert!(matches!(result, Err(ArtifactError::Deserialize { .. })));
    }
}
