use chrono::{Duration, NaiveDate};
use rand::distributions::Distribution;
use statrs::distribution::Normal;

use crate::models::{NumericColumn, ObservationTable, TextColumn};
use crate::stats;

const LOCATIONS: [&str; 5] = ["Camden", "Chelsea", "Islington", "Southwark", "Kensington"];

/// Table holding only the given numeric columns.
pub fn numeric_table(columns: &[(&str, Vec<f64>)]) -> ObservationTable {
    let rows = columns.first().map_or(0, |(_, values)| values.len());
    ObservationTable {
        timestamps: hourly(rows),
        location_ids: vec!["Camden".to_string(); rows],
        weather_categories: vec!["Clear".to_string(); rows],
        numeric: columns
            .iter()
            .map(|(name, values)| NumericColumn {
                name: name.to_string(),
                values: values.clone(),
            })
            .collect(),
        text: Vec::new(),
    }
}

/// Seeded traffic/weather table with eight standard variables plus `extra`
/// correlated ones, driven by three latent factors.
pub fn synthetic_table(rows: usize, extra: usize, seed: u64) -> ObservationTable {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut rng = stats::keyed_rng(seed, "synthetic", "observations");
    let mut draw = || normal.sample(&mut rng);

    let mut latent = Vec::with_capacity(rows);
    for _ in 0..rows {
        latent.push([draw(), draw(), draw()]);
    }

    let mut column = |name: &str, f: &dyn Fn(&[f64; 3]) -> f64, noise: f64| NumericColumn {
        name: name.to_string(),
        values: latent.iter().map(|l| f(l) + noise * draw()).collect(),
    };

    let mut numeric = vec![
        column("vehicle_count", &|l: &[f64; 3]| 13_000.0 + 2_000.0 * l[0] - 800.0 * l[1], 300.0),
        column("avg_speed_kmh", &|l: &[f64; 3]| 45.0 - 6.0 * l[0] - 4.0 * l[1], 2.0),
        column("accident_count", &|l: &[f64; 3]| 1.5 + 0.5 * l[1] + 0.3 * l[0], 0.5),
        column("visibility_m", &|l: &[f64; 3]| 8_000.0 - 2_500.0 * l[1], 500.0),
        column("temperature_c", &|l: &[f64; 3]| 12.0 - 5.0 * l[1] + 1.5 * l[2], 3.0),
        column("humidity", &|l: &[f64; 3]| 70.0 + 10.0 * l[1], 5.0),
        column("rain_mm", &|l: &[f64; 3]| 2.0 + 2.0 * l[1], 1.0),
        column("wind_speed_kmh", &|l: &[f64; 3]| 15.0 + 5.0 * l[1] - 2.0 * l[2], 4.0),
    ];
    for index in 0..extra {
        let weights = [
            ((index % 3) + 1) as f64 / 3.0,
            ((index % 4) as f64 - 1.5) / 2.0,
            ((index % 5) + 1) as f64 / 5.0,
        ];
        let name = format!("sensor_{}", index + 1);
        numeric.push(column(
            &name,
            &|l: &[f64; 3]| weights[0] * l[0] + weights[1] * l[1] + weights[2] * l[2],
            0.5,
        ));
    }

    let weather_categories: Vec<String> = latent
        .iter()
        .map(|l| match l[1] {
            severity if severity < -0.6 => "Clear",
            severity if severity < 0.2 => "Rain",
            severity if severity < 0.9 => "Fog",
            _ => "Snow",
        })
        .map(str::to_string)
        .collect();
    let road_condition = weather_categories
        .iter()
        .map(|category| match category.as_str() {
            "Clear" => "Dry",
            "Snow" => "Snowy",
            _ => "Wet",
        })
        .map(str::to_string)
        .collect();

    ObservationTable {
        timestamps: hourly(rows),
        location_ids: (0..rows)
            .map(|row| LOCATIONS[row % LOCATIONS.len()].to_string())
            .collect(),
        weather_categories,
        numeric,
        text: vec![TextColumn {
            name: "road_condition".to_string(),
            values: road_condition,
        }],
    }
}

fn hourly(rows: usize) -> Vec<chrono::NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap();
    (0..rows)
        .map(|row| start + Duration::hours(row as i64))
        .collect()
}
