// Shared fixtures for the integration tests
//
// Builds run tables in the default column layout (g, b, a, c, seed, config,
// result, t_total) with b = a = c = 1.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct RunTable {
    with_config: bool,
    rows: Vec<String>,
}

impl RunTable {
    pub fn new() -> Self {
        Self {
            with_config: true,
            rows: Vec::new(),
        }
    }

    /// For sources labelled on the command line
    pub fn without_config() -> Self {
        Self {
            with_config: false,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, config: &str, g: i64, seed: i64, result: &str, t_total: &str) {
        let row = if self.with_config {
            format!("{},1,1,1,{},{},{},{}", g, seed, config, result, t_total)
        } else {
            format!("{},1,1,1,{},{},{}", g, seed, result, t_total)
        };
        self.rows.push(row);
    }

    pub fn solved(&mut self, config: &str, g: i64, seed: i64, t_total: f64) {
        self.push(config, g, seed, "", &t_total.to_string());
    }

    pub fn timeout(&mut self, config: &str, g: i64, seed: i64) {
        self.push(config, g, seed, "Timeout", "");
    }

    pub fn unsolvable(&mut self, config: &str, g: i64, seed: i64) {
        self.push(config, g, seed, "Unsolvable", "");
    }

    /// Arbitrary result flag, e.g. a crash marker
    pub fn flagged(&mut self, config: &str, g: i64, seed: i64, flag: &str) {
        self.push(config, g, seed, flag, "");
    }

    pub fn to_csv(&self) -> String {
        let header = if self.with_config {
            "g,b,a,c,seed,config,result,t_total"
        } else {
            "g,b,a,c,seed,result,t_total"
        };
        let mut out = String::from(header);
        out.push('\n');
        for row in &self.rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }
}

pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}
