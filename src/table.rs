use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use statrs::statistics::Statistics;

use crate::error::{GoldError, GoldResult};
use crate::models::{NumericColumn, ObservationTable, TextColumn, WeatherSummary};

pub const TIMESTAMP: &str = "timestamp";
pub const LOCATION_ID: &str = "location_id";
pub const WEATHER_CATEGORY: &str = "weather_category";
pub const REQUIRED_NUMERIC: [&str; 4] = [
    "vehicle_count",
    "avg_speed_kmh",
    "accident_count",
    "visibility_m",
];

impl ObservationTable {
    pub fn from_path(path: &Path) -> GoldResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads the cleaned Silver table from CSV.
    ///
    /// Any column other than the three key columns whose cells all parse as
    /// numbers becomes an analysis variable; everything else is kept as text.
    pub fn from_reader<R: Read>(reader: R) -> GoldResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(GoldError::data_quality(format!("duplicate column `{header}`")));
            }
        }
        for required in [TIMESTAMP, LOCATION_ID, WEATHER_CATEGORY]
            .into_iter()
            .chain(REQUIRED_NUMERIC)
        {
            if !seen.contains(required) {
                return Err(GoldError::data_quality(format!(
                    "missing required column `{required}`"
                )));
            }
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (index, header) in headers.iter().enumerate() {
                let value = record.get(index).unwrap_or_default();
                if value.is_empty() {
                    return Err(GoldError::data_quality(format!(
                        "missing value in column `{header}` at row {row}"
                    )));
                }
                cells[index].push(value.to_string());
            }
        }

        let mut table = ObservationTable {
            timestamps: Vec::new(),
            location_ids: Vec::new(),
            weather_categories: Vec::new(),
            numeric: Vec::new(),
            text: Vec::new(),
        };

        for (name, values) in headers.into_iter().zip(cells) {
            match name.as_str() {
                TIMESTAMP => {
                    table.timestamps = values
                        .iter()
                        .enumerate()
                        .map(|(row, raw)| {
                            parse_timestamp(raw).ok_or_else(|| {
                                GoldError::data_quality(format!(
                                    "unparseable timestamp `{raw}` at row {row}"
                                ))
                            })
                        })
                        .collect::<GoldResult<_>>()?;
                }
                LOCATION_ID => table.location_ids = values,
                WEATHER_CATEGORY => table.weather_categories = values,
                _ => match parse_numeric(&values) {
                    Some(numbers) => table.numeric.push(NumericColumn {
                        name,
                        values: numbers,
                    }),
                    None if REQUIRED_NUMERIC.contains(&name.as_str()) => {
                        return Err(GoldError::data_quality(format!(
                            "column `{name}` must be numeric"
                        )));
                    }
                    None => table.text.push(TextColumn { name, values }),
                },
            }
        }

        table.validate()?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Checks the table invariants: non-empty, rectangular, finite numbers.
    pub fn validate(&self) -> GoldResult<()> {
        if self.is_empty() {
            return Err(GoldError::data_quality("observation table is empty"));
        }
        let rows = self.len();
        let ragged = self.location_ids.len() != rows
            || self.weather_categories.len() != rows
            || self.numeric.iter().any(|column| column.values.len() != rows)
            || self.text.iter().any(|column| column.values.len() != rows);
        if ragged {
            return Err(GoldError::data_quality(
                "observation columns have differing lengths",
            ));
        }
        for column in &self.numeric {
            ensure_finite(&column.name, &column.values)?;
        }
        Ok(())
    }

    pub fn numeric_names(&self) -> Vec<&str> {
        self.numeric.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
    }

    /// Looks up a variable referenced by configuration. Unknown names are a
    /// configuration error, non-finite cells a data quality error.
    pub fn require_numeric(&self, name: &str) -> GoldResult<&[f64]> {
        let values = self.numeric_column(name).ok_or_else(|| {
            GoldError::configuration(format!("`{name}` is not a numeric column of the table"))
        })?;
        ensure_finite(name, values)?;
        Ok(values)
    }

    /// Observation counts and mean traffic per weather category, largest first.
    pub fn weather_summary(&self, traffic_metric: &str) -> Vec<WeatherSummary> {
        let traffic = self.numeric_column(traffic_metric);
        let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for (row, category) in self.weather_categories.iter().enumerate() {
            let value = traffic.map_or(f64::NAN, |values| values[row]);
            groups.entry(category.as_str()).or_default().push(value);
        }

        let mut summaries: Vec<WeatherSummary> = groups
            .into_iter()
            .map(|(category, values)| WeatherSummary {
                weather_category: category.to_string(),
                count: values.len(),
                avg_traffic: values.iter().mean(),
            })
            .collect();
        summaries.sort_by(|a, b| b.count.cmp(&a.count));
        summaries
    }
}

/// BLAKE3 digest of the input file, recorded in stage manifests.
pub fn fingerprint_file(path: &Path) -> GoldResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub fn ensure_finite(name: &str, values: &[f64]) -> GoldResult<()> {
    match values.iter().position(|value| !value.is_finite()) {
        Some(row) => Err(GoldError::data_quality(format!(
            "non-finite value in column `{name}` at row {row}"
        ))),
        None => Ok(()),
    }
}

fn parse_numeric(values: &[String]) -> Option<Vec<f64>> {
    values.iter().map(|raw| raw.parse::<f64>().ok()).collect()
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
