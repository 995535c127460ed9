//! Record loader
//!
//! Reads per-run CSV tables, checks that every required column is present and
//! keeps only those columns. File discovery is the caller's business: the
//! loader receives an explicit list of sources.

use crate::error::{AnalysisError, Result};
use crate::record::{
    BoundValues, ConfigLabel, InstanceKey, ParamValue, RecordOrigin, RecordTable, RunRecord,
};
use crate::schema::Schema;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Where rows come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    File(PathBuf),
    /// In-memory CSV text (tests, stdin)
    Inline(String),
}

/// A single tabular source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSource {
    pub name: String,
    pub kind: SourceKind,
    /// Assign this configuration label to every row instead of reading the
    /// configuration column
    pub config_override: Option<ConfigLabel>,
}

impl RecordSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            kind: SourceKind::File(path),
            config_override: None,
        }
    }

    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Inline(text.into()),
            config_override: None,
        }
    }

    pub fn with_config(mut self, label: impl Into<ConfigLabel>) -> Self {
        self.config_override = Some(label.into());
        self
    }

    /// Parse a CLI source spec: `PATH` or `LABEL=PATH`
    pub fn from_spec(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((label, path)) if !label.is_empty() && !path.is_empty() => {
                Self::file(path).with_config(ConfigLabel::new(label))
            }
            _ => Self::file(spec),
        }
    }

    /// Read the source into memory
    pub fn read(&self) -> Result<LoadedSource> {
        let bytes = match &self.kind {
            SourceKind::File(path) => fs::read(path)?,
            SourceKind::Inline(text) => text.as_bytes().to_vec(),
        };
        Ok(LoadedSource {
            source: self.clone(),
            bytes,
        })
    }
}

/// A source together with the bytes read from it
///
/// The cache key and the parser both work from these bytes, so a file
/// edited mid-run cannot be hashed as one version and parsed as another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub source: RecordSource,
    pub bytes: Vec<u8>,
}

impl LoadedSource {
    pub fn name(&self) -> &str {
        &self.source.name
    }
}

/// Read every source once
pub fn read_sources(sources: &[RecordSource]) -> Result<Vec<LoadedSource>> {
    sources.iter().map(RecordSource::read).collect()
}

/// Load and concatenate all sources
///
/// # Errors
/// `Schema` when any source lacks a required column, `Parse` on malformed
/// CSV or non-numeric metric cells, `Io` on unreadable files.
pub fn load_sources(sources: &[RecordSource], schema: &Schema) -> Result<RecordTable> {
    parse_loaded(&read_sources(sources)?, schema)
}

/// Parse and concatenate sources that were already read
pub fn parse_loaded(sources: &[LoadedSource], schema: &Schema) -> Result<RecordTable> {
    let mut table = RecordTable::default();
    for loaded in sources {
        let records = parse_source(
            loaded.name(),
            &loaded.bytes,
            schema,
            loaded.source.config_override.as_ref(),
        )?;
        tracing::debug!(source = %loaded.name(), rows = records.len(), "loaded source");
        table.records.extend(records);
    }
    tracing::info!(
        sources = sources.len(),
        rows = table.len(),
        configurations = table.configurations().len(),
        "record load complete"
    );
    Ok(table)
}

fn csv_error(name: &str, err: csv::Error) -> AnalysisError {
    let line = err.position().map_or(0, |p| p.line() as usize);
    AnalysisError::Parse {
        source_name: name.to_string(),
        line,
        message: err.to_string(),
    }
}

/// Parse one CSV table into records
///
/// Cells are trimmed and blank lines skipped. Line numbers in errors and
/// record origins are 1-based, counting the header as line 1.
pub fn parse_source(
    name: &str,
    data: &[u8],
    schema: &Schema,
    config_override: Option<&ConfigLabel>,
) -> Result<Vec<RunRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(name, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if header.is_empty() {
        // An empty file has no header, so no required column can be present
        return Err(AnalysisError::Schema {
            source_name: name.to_string(),
            column: schema.params.first().cloned().unwrap_or_default(),
        });
    }

    let index = ColumnIndex::resolve(name, &header, schema, config_override.is_none())?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(name, e))?;
        let line = row.position().map_or(0, |p| p.line() as usize);
        if row.len() != header.len() {
            return Err(AnalysisError::Parse {
                source_name: name.to_string(),
                line,
                message: format!("expected {} fields, found {}", header.len(), row.len()),
            });
        }
        records.push(index.build(name, line, &row, config_override)?);
    }
    Ok(records)
}

/// Positions of the required columns within one source's header
struct ColumnIndex<'s> {
    schema: &'s Schema,
    params: Vec<usize>,
    seed: usize,
    config: Option<usize>,
    outcome: usize,
    metric: usize,
    auxiliary: Vec<(String, usize)>,
    invariants: Vec<(String, usize)>,
    /// initial, lower, achieved
    bounds: Option<[usize; 3]>,
}

impl<'s> ColumnIndex<'s> {
    fn resolve(name: &str, header: &[String], schema: &'s Schema, needs_config: bool) -> Result<Self> {
        let find = |column: &str| -> Result<usize> {
            header
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| AnalysisError::Schema {
                    source_name: name.to_string(),
                    column: column.to_string(),
                })
        };

        // Report the first missing column in declaration order
        for column in schema.required_columns_for(needs_config) {
            find(column.as_str())?;
        }

        let bounds = match &schema.bounds {
            Some(columns) => Some([
                find(&columns.initial)?,
                find(&columns.lower)?,
                find(&columns.achieved)?,
            ]),
            None => None,
        };

        Ok(Self {
            schema,
            params: schema
                .params
                .iter()
                .map(|p| find(p.as_str()))
                .collect::<Result<Vec<_>>>()?,
            seed: find(schema.seed.as_str())?,
            config: if needs_config {
                Some(find(schema.config.as_str())?)
            } else {
                None
            },
            outcome: find(schema.outcome.as_str())?,
            metric: find(schema.metric.as_str())?,
            auxiliary: schema
                .auxiliary
                .iter()
                .map(|c| find(c.as_str()).map(|i| (c.clone(), i)))
                .collect::<Result<Vec<_>>>()?,
            invariants: schema
                .invariants
                .iter()
                .map(|c| find(c.as_str()).map(|i| (c.clone(), i)))
                .collect::<Result<Vec<_>>>()?,
            bounds,
        })
    }

    fn build(
        &self,
        name: &str,
        line: usize,
        row: &StringRecord,
        config_override: Option<&ConfigLabel>,
    ) -> Result<RunRecord> {
        let params = self.params.iter().map(|&i| ParamValue::parse(&row[i])).collect();
        let seed = ParamValue::parse(&row[self.seed]);

        let configuration = match (config_override, self.config) {
            (Some(label), _) => label.clone(),
            (None, Some(i)) => ConfigLabel::new(&row[i]),
            (None, None) => {
                return Err(AnalysisError::Schema {
                    source_name: name.to_string(),
                    column: self.schema.config.clone(),
                })
            }
        };

        let flag = Some(&row[self.outcome])
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let metric = parse_number(name, line, &self.schema.metric, &row[self.metric])?;

        let mut auxiliary = BTreeMap::new();
        for (column, i) in &self.auxiliary {
            if let Some(v) = parse_number(name, line, column, &row[*i])? {
                auxiliary.insert(column.clone(), v);
            }
        }

        let invariants = self
            .invariants
            .iter()
            .map(|(column, i)| (column.clone(), row[*i].to_string()))
            .collect();

        let bounds = match (self.bounds, &self.schema.bounds) {
            (Some([initial, lower, achieved]), Some(columns)) => Some(BoundValues {
                initial: parse_number(name, line, &columns.initial, &row[initial])?,
                lower: parse_number(name, line, &columns.lower, &row[lower])?,
                achieved: parse_number(name, line, &columns.achieved, &row[achieved])?,
            }),
            _ => None,
        };

        Ok(RunRecord {
            instance: InstanceKey::new(params, seed),
            configuration,
            flag,
            metric,
            auxiliary,
            invariants,
            bounds,
            origin: RecordOrigin {
                source: name.to_string(),
                line,
            },
        })
    }
}

/// Empty and NaN cells are absent values
fn parse_number(name: &str, line: usize, column: &str, raw: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "<NA>" {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AnalysisError::Parse {
            source_name: name.to_string(),
            line,
            message: format!("column '{}' is not numeric: {:?}", column, trimmed),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BoundColumns;

    const HEADER: &str = "g,b,a,c,seed,makespan,config,result,t_total,n_literals";

    fn schema() -> Schema {
        Schema {
            auxiliary: vec!["n_literals".to_string()],
            invariants: vec!["makespan".to_string()],
            ..Schema::default()
        }
    }

    const DEFAULT_HEADER: &str = "g,b,a,c,seed,config,result,t_total";

    #[test]
    fn test_quoted_fields_and_crlf() {
        let text = format!("{DEFAULT_HEADER}\r\n4,1,2,3,0,\"enc \"\"a\"\", f=2\",,10\r\n");
        let records = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].configuration.as_str(), "enc \"a\", f=2");
        assert_eq!(records[0].metric, Some(10.0));
    }

    #[test]
    fn test_blank_lines_skipped_and_line_numbers_kept() {
        let text = format!("{DEFAULT_HEADER}\n\n4,1,2,3,0,x,,10\n\n\n4,1,2,3,1,x,,11\n");
        let records = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        assert_eq!(records.len(), 2);

        let text = format!("{DEFAULT_HEADER}\n4,1,2,3,0,x,,10\n4,1,2,3,1,x,,11\n");
        let records = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        let lines: Vec<usize> = records.iter().map(|r| r.origin.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_cells_are_trimmed() {
        let text = format!("{DEFAULT_HEADER}\n 4 , 1,2,3, 0 , x ,  , 10 \n");
        let records = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        assert_eq!(records[0].configuration.as_str(), "x");
        assert_eq!(records[0].flag, None);
        assert_eq!(records[0].instance.seed, ParamValue::Int(0));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let mut data = format!("{DEFAULT_HEADER}\n4,1,2,3,0,").into_bytes();
        data.extend_from_slice(b"\xff\xfe,,10\n");
        assert!(matches!(
            parse_source("t", &data, &Schema::default(), None),
            Err(AnalysisError::Parse { .. })
        ));
    }

    #[test]
    fn test_bound_columns_are_read_for_every_outcome() {
        let schema = Schema {
            bounds: Some(BoundColumns::default()),
            ..Schema::default()
        };
        let text = format!(
            "{DEFAULT_HEADER},makespan,initial_bound,lower_bound\n\
             4,1,2,3,0,x,,10,12,12,12\n\
             4,1,2,3,1,x,Timeout,,,12,14\n"
        );
        let records = parse_source("t", text.as_bytes(), &schema, None).unwrap();
        assert_eq!(
            records[0].bounds,
            Some(BoundValues {
                initial: Some(12.0),
                lower: Some(12.0),
                achieved: Some(12.0),
            })
        );
        assert_eq!(
            records[1].bounds.map(|b| b.verdict()),
            Some(crate::record::BoundVerdict::Raised)
        );

        let without = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        assert_eq!(without[0].bounds, None);
    }

    #[test]
    fn test_missing_bound_column_is_schema_error() {
        let schema = Schema {
            bounds: Some(BoundColumns::default()),
            ..Schema::default()
        };
        let text = format!("{DEFAULT_HEADER},makespan,initial_bound\n4,1,2,3,0,x,,10,12,12\n");
        match parse_source("t", text.as_bytes(), &schema, None) {
            Err(AnalysisError::Schema { column, .. }) => assert_eq!(column, "lower_bound"),
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_sources_reads_once() {
        let loaded = read_sources(&[RecordSource::inline("a.csv", "g\n1\n")]).unwrap();
        assert_eq!(loaded[0].name(), "a.csv");
        assert_eq!(loaded[0].bytes, b"g\n1\n");
    }

    #[test]
    fn test_parse_source_extracts_required_fields() {
        let text = format!(
            "{HEADER}\n4,1,2,3,0,12,1|2,,1534.5,900\n4,1,2,3,1,,1|2,Timeout,,\n"
        );
        let records = parse_source("runs.csv", text.as_bytes(), &schema(), None).unwrap();
        assert_eq!(records.len(), 2);

        let solved = &records[0];
        assert_eq!(solved.configuration.as_str(), "1|2");
        assert_eq!(solved.flag, None);
        assert_eq!(solved.metric, Some(1534.5));
        assert_eq!(solved.auxiliary.get("n_literals"), Some(&900.0));
        assert_eq!(solved.invariants.get("makespan").map(String::as_str), Some("12"));
        assert_eq!(solved.instance.seed, ParamValue::Int(0));
        assert_eq!(solved.origin.line, 2);

        let timed_out = &records[1];
        assert_eq!(timed_out.flag.as_deref(), Some("Timeout"));
        assert_eq!(timed_out.metric, None);
        assert!(timed_out.auxiliary.is_empty());
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let text = "g,b,a,c,seed,config,result\n4,1,2,3,0,x,\n";
        let err = parse_source("bad.csv", text.as_bytes(), &Schema::default(), None).unwrap_err();
        match err {
            AnalysisError::Schema {
                source_name,
                column,
            } => {
                assert_eq!(source_name, "bad.csv");
                assert_eq!(column, "t_total");
            }
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_override_skips_config_column() {
        let text = "g,b,a,c,seed,result,t_total\n4,1,2,3,0,,10\n";
        let label = ConfigLabel::new("sequential-amo");
        let records = parse_source("enc/1.csv", text.as_bytes(), &Schema::default(), Some(&label)).unwrap();
        assert_eq!(records[0].configuration, label);
    }

    #[test]
    fn test_field_count_mismatch() {
        let text = "g,b,a,c,seed,config,result,t_total\n4,1,2,3,0,x,,10,extra\n";
        assert!(matches!(
            parse_source("t", text.as_bytes(), &Schema::default(), None),
            Err(AnalysisError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_non_numeric_metric() {
        let text = "g,b,a,c,seed,config,result,t_total\n4,1,2,3,0,x,,fast\n";
        assert!(matches!(
            parse_source("t", text.as_bytes(), &Schema::default(), None),
            Err(AnalysisError::Parse { .. })
        ));
    }

    #[test]
    fn test_nan_metric_is_absent() {
        let text = "g,b,a,c,seed,config,result,t_total\n4,1,2,3,0,x,Timeout,NaN\n";
        let records = parse_source("t", text.as_bytes(), &Schema::default(), None).unwrap();
        assert_eq!(records[0].metric, None);
    }

    #[test]
    fn test_empty_source_is_schema_error() {
        assert!(matches!(
            parse_source("empty", b"", &Schema::default(), None),
            Err(AnalysisError::Schema { .. })
        ));
    }

    #[test]
    fn test_load_sources_concatenates() {
        let a = RecordSource::inline("a", "g,b,a,c,seed,config,result,t_total\n4,1,2,3,0,x,,10\n");
        let b = RecordSource::inline("b", "t_total,result,config,seed,c,a,b,g\n20,,y,0,3,2,1,4\n");
        let table = load_sources(&[a, b], &Schema::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].instance, table.records[1].instance);
        assert_eq!(
            table.configurations(),
            vec![ConfigLabel::new("x"), ConfigLabel::new("y")]
        );
    }

    #[test]
    fn test_load_sources_fails_if_any_source_lacks_column() {
        let good = RecordSource::inline("good", "g,b,a,c,seed,config,result,t_total\n4,1,2,3,0,x,,10\n");
        let bad = RecordSource::inline("bad", "g,b,a,c,seed,config,result\n4,1,2,3,0,x,\n");
        assert!(matches!(
            load_sources(&[good, bad], &Schema::default()),
            Err(AnalysisError::Schema { .. })
        ));
    }

    #[test]
    fn test_source_spec_parsing() {
        let plain = RecordSource::from_spec("runs/0.csv");
        assert_eq!(plain.config_override, None);
        assert_eq!(plain.kind, SourceKind::File(PathBuf::from("runs/0.csv")));

        let labelled = RecordSource::from_spec("binomial=runs/4/a.csv");
        assert_eq!(labelled.config_override, Some(ConfigLabel::new("binomial")));
        assert_eq!(labelled.kind, SourceKind::File(PathBuf::from("runs/4/a.csv")));
    }
}
