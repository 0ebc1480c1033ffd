//! Serde adapter for count and error columns.
//!
//! JSON has no NaN or infinity, so non-finite cells are written as the strings
//! `"NaN"`, `"inf"` and `"-inf"` and read back from them.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Cell {
    Number(f64),
    Text(String),
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self::Number(value)
        } else if value.is_nan() {
            Self::Text("NaN".to_string())
        } else if value > 0.0 {
            Self::Text("inf".to_string())
        } else {
            Self::Text("-inf".to_string())
        }
    }
}

fn parse_text(text: &str) -> Option<f64> {
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().copied().map(Cell::from))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    Vec::<Cell>::deserialize(deserializer)?
        .into_iter()
        .map(|cell| match cell {
            Cell::Number(value) => Ok(value),
            Cell::Text(text) => parse_text(&text).ok_or_else(|| {
                D::Error::custom(format!(
                    "expected a number, \"NaN\", \"inf\" or \"-inf\", got \"{text}\""
                ))
            }),
        })
        .collect()
}
