//! Header mapping, records and the job description that bundles them.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Result;
use crate::styles::FillColor;
use crate::value::CellValue;

/// Field key -> display label. Iteration order is column order.
pub type HeaderMapping = IndexMap<String, String>;

/// Field key -> value for one data row. Iteration order matters, see [`ColumnPlacement`].
pub type Record = IndexMap<String, CellValue>;

pub const DEFAULT_FILL: &str = "00FF00";

/// How a record's values are assigned to columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPlacement {
    /// Matching keys fill columns A, B, C... in the record's own key order.
    /// A record whose keys are ordered differently from the header mapping
    /// lands under the wrong headers.
    #[default]
    Sequential,
    /// Each value goes to the column of its key in the header mapping.
    HeaderAligned,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub headers: HeaderMapping,
    pub records: Vec<Record>,
    pub fill: FillColor,
    pub placement: ColumnPlacement,
}

#[derive(Deserialize)]
struct RawJob {
    headers: IndexMap<String, String>,
    #[serde(default)]
    records: Vec<IndexMap<String, serde_json::Value>>,
    #[serde(default)]
    fill: Option<String>,
    #[serde(default)]
    placement: ColumnPlacement,
}

impl Job {
    pub fn new(headers: HeaderMapping, records: Vec<Record>) -> Self {
        Self {
            headers,
            records,
            fill: FillColor::default(),
            placement: ColumnPlacement::default(),
        }
    }

    /// Parses `{"headers": {..}, "records": [..], "fill": "RRGGBB", "placement": ".."}`.
    /// Only `headers` is required.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawJob = serde_json::from_str(text)?;
        let fill = FillColor::parse(raw.fill.as_deref().unwrap_or(DEFAULT_FILL))?;
        let records = raw
            .records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(key, value)| (key, CellValue::from(value)))
                    .collect()
            })
            .collect();

        Ok(Self {
            headers: raw.headers,
            records,
            fill,
            placement: raw.placement,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Country list used when no job file is supplied.
    pub fn sample() -> Self {
        let headers = HeaderMapping::from([
            ("CountryId".to_string(), "Country ID".to_string()),
            ("CountryCode".to_string(), "Country Code".to_string()),
            ("CountryName".to_string(), "Country Name".to_string()),
        ]);

        let country = |id: i64, code: &str, name: &str| -> Record {
            Record::from([
                ("CountryId".to_string(), CellValue::from(id)),
                ("CountryCode".to_string(), CellValue::from(code)),
                ("CountryName".to_string(), CellValue::from(name)),
            ])
        };

        Self::new(
            headers,
            vec![
                country(1, "1", "United States of America"),
                country(2, "91", "Canada"),
                country(3, "44", "United Kingdom"),
            ],
        )
    }
}
