use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{AnswerValue, Respondent, SurveyWave, WaveSchema};
use crate::error::CompareError;

/// One raw table row before the schema split: column name → cell.
type RawRow = BTreeMap<String, AnswerValue>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one survey wave from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – the microdata provider's format (one row per
///   respondent, flat typed columns)
/// * `.csv`  – header row with column names, cells type-guessed
/// * `.json` – records-oriented array of objects
///
/// The declared [`WaveSchema`] is validated against the table once, fail
/// fast: the weight, id and every demographic column must be present, and
/// every weight must be a positive finite number.
pub fn load_wave(path: &Path, schema: &WaveSchema) -> Result<SurveyWave> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (columns, rows) = match ext.as_str() {
        "parquet" | "pq" => read_parquet(path),
        "csv" => read_csv(path),
        "json" => read_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("reading {}", path.display()))?;

    let wave = build_wave(schema, &columns, rows)
        .with_context(|| format!("loading wave {} from {}", schema.year, path.display()))?;
    info!(
        "loaded wave {}: {} respondents, {} question columns",
        wave.year(),
        wave.len(),
        wave.question_columns().len()
    );
    Ok(wave)
}

// ---------------------------------------------------------------------------
// Schema split: raw rows → Respondent rows
// ---------------------------------------------------------------------------

fn build_wave(
    schema: &WaveSchema,
    columns: &BTreeSet<String>,
    rows: Vec<RawRow>,
) -> Result<SurveyWave> {
    for required in [&schema.weight_column, &schema.id_column] {
        if !columns.contains(required) {
            return Err(CompareError::schema(format!(
                "wave {}: required column '{required}' not found in table",
                schema.year
            ))
            .into());
        }
    }
    for demographic in &schema.demographics {
        if !columns.contains(demographic) {
            return Err(CompareError::schema(format!(
                "wave {}: declared demographic column '{demographic}' not found in table",
                schema.year
            ))
            .into());
        }
    }

    let mut respondents = Vec::with_capacity(rows.len());
    for (row_no, mut row) in rows.into_iter().enumerate() {
        let id = match row.remove(&schema.id_column) {
            Some(v) if !v.is_null() => v.to_string(),
            _ => {
                return Err(CompareError::schema(format!(
                    "wave {}: row {row_no} has no value in id column '{}'",
                    schema.year, schema.id_column
                ))
                .into());
            }
        };
        let weight = match row.remove(&schema.weight_column) {
            Some(v) => v.as_f64().ok_or_else(|| {
                CompareError::schema(format!(
                    "wave {}: row {row_no} has non-numeric weight '{v}'",
                    schema.year
                ))
            })?,
            None => {
                return Err(CompareError::schema(format!(
                    "wave {}: row {row_no} has no weight value",
                    schema.year
                ))
                .into());
            }
        };
        let mut attributes = BTreeMap::new();
        for demographic in &schema.demographics {
            let value = row.remove(demographic).unwrap_or(AnswerValue::Null);
            attributes.insert(demographic.clone(), value);
        }
        // Every remaining column is a question column; null cells are kept
        // so missingness can be profiled later.
        respondents.push(Respondent {
            id,
            weight,
            answers: row,
            attributes,
        });
    }

    Ok(SurveyWave::from_respondents(
        schema.year,
        respondents,
        &schema.demographics,
    )?)
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

fn read_parquet(path: &Path) -> Result<(BTreeSet<String>, Vec<RawRow>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns = BTreeSet::new();
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        columns.extend(names.iter().cloned());

        for row in 0..batch.num_rows() {
            let mut cells = BTreeMap::new();
            for (idx, name) in names.iter().enumerate() {
                let value = cell_value(batch.column(idx), row)
                    .with_context(|| format!("column '{name}', row {row}"))?;
                cells.insert(name.clone(), value);
            }
            rows.push(cells);
        }
    }

    Ok((columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn cell_value(col: &Arc<dyn Array>, row: usize) -> Result<AnswerValue> {
    if col.is_null(row) {
        return Ok(AnswerValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            AnswerValue::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            AnswerValue::String(arr.value(row).to_string())
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            AnswerValue::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            AnswerValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            AnswerValue::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            AnswerValue::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            AnswerValue::Bool(arr.value(row))
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<(BTreeSet<String>, Vec<RawRow>)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let mut cells = BTreeMap::new();
        for (idx, value) in record.iter().enumerate() {
            if let Some(name) = headers.get(idx) {
                cells.insert(name.clone(), guess_cell(value));
            }
        }
        rows.push(cells);
    }

    Ok((headers.into_iter().collect(), rows))
}

/// Best-effort typing for a text cell: integer, then float, then bool,
/// otherwise string; an empty cell reads as null. Also used to type the raw
/// answer codes of catalog configuration.
pub fn guess_cell(s: &str) -> AnswerValue {
    if s.is_empty() {
        return AnswerValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return AnswerValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return AnswerValue::Float(f);
    }
    if s == "true" || s == "false" {
        return AnswerValue::Bool(s == "true");
    }
    AnswerValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default
/// `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "DIRECTORIO": "00001", "WEIGHT": 1.2, "DPTO": "11", "P6933": 1 },
///   ...
/// ]
/// ```
fn read_json(path: &Path) -> Result<(BTreeSet<String>, Vec<RawRow>)> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    let records = root
        .as_array()
        .context("Expected top-level JSON array of records")?;

    let mut columns = BTreeSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let mut cells = BTreeMap::new();
        for (key, val) in obj {
            columns.insert(key.clone());
            cells.insert(key.clone(), json_cell(val));
        }
        rows.push(cells);
    }

    Ok((columns, rows))
}

/// Convert a JSON value into a survey cell. Shared with the filter and
/// export-config parsers, which carry cells in the same JSON shapes.
pub fn json_cell(val: &JsonValue) -> AnswerValue {
    match val {
        JsonValue::String(s) => AnswerValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                AnswerValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                AnswerValue::Float(f)
            } else {
                AnswerValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => AnswerValue::Bool(*b),
        JsonValue::Null => AnswerValue::Null,
        other => AnswerValue::String(other.to_string()),
    }
}
