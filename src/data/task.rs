//! Learning task definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Learning task an estimator is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Binary,
    Multiclass,
    Regression,
    Rank,
    Forecast,
}

impl Task {
    /// Classification tasks predict discrete labels
    pub fn is_classification(&self) -> bool {
        matches!(self, Task::Binary | Task::Multiclass)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Binary => "binary",
            Task::Multiclass => "multiclass",
            Task::Regression => "regression",
            Task::Rank => "rank",
            Task::Forecast => "forecast",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Task::Binary),
            "multi" | "multiclass" => Ok(Task::Multiclass),
            "regression" => Ok(Task::Regression),
            "rank" => Ok(Task::Rank),
            "forecast" | "ts_forecast" => Ok(Task::Forecast),
            other => Err(format!("unknown task: {}", other)),
        }
    }
}
