use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    /// How many transactions the history screen shows
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_quick_amounts")]
    pub quick_amounts: Vec<u32>,
}

fn default_starting_balance() -> Decimal {
    Decimal::from(1000)
}

fn default_history_limit() -> usize {
    10
}

fn default_quick_amounts() -> Vec<u32> {
    vec![20, 40, 60, 100, 200, 500]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            history_limit: default_history_limit(),
            quick_amounts: default_quick_amounts(),
        }
    }
}

impl Config {
    /// load reads a JSON config file, any missing field keeps its default
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}
