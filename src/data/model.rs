use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CompareError, CompareResult};

// ---------------------------------------------------------------------------
// AnswerValue – a single cell in a survey table
// ---------------------------------------------------------------------------

/// A dynamically-typed survey cell: coded answers, demographic attributes and
/// free strings all flow through this one type.
/// Used as a key in `BTreeMap` / `BTreeSet` downstream so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so AnswerValue can key ordered collections --

impl Eq for AnswerValue {}

impl PartialOrd for AnswerValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnswerValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use AnswerValue::*;
        fn discriminant(v: &AnswerValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for AnswerValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AnswerValue::String(s) => s.hash(state),
            AnswerValue::Integer(i) => i.hash(state),
            AnswerValue::Float(f) => f.to_bits().hash(state),
            AnswerValue::Bool(b) => b.hash(state),
            AnswerValue::Null => {}
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::String(s) => write!(f, "{s}"),
            AnswerValue::Integer(i) => write!(f, "{i}"),
            AnswerValue::Float(v) => write!(f, "{v}"),
            AnswerValue::Bool(b) => write!(f, "{b}"),
            AnswerValue::Null => write!(f, "<null>"),
        }
    }
}

impl AnswerValue {
    /// Try to interpret the value as an `f64` for scale and bin arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Float(v) => Some(*v),
            AnswerValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integer view of the value. Floats without a fractional part fold onto
    /// the corresponding integer, so a stored `2.0` matches answer code `2`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AnswerValue::Integer(i) => Some(*i),
            AnswerValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AnswerValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Respondent – one row of a survey wave
// ---------------------------------------------------------------------------

/// A single survey respondent (one row of the source table).
///
/// The declared [`WaveSchema`] decides which columns land in `attributes`
/// (demographics, usable in filters) and which in `answers` (question codes).
#[derive(Debug, Clone, PartialEq)]
pub struct Respondent {
    /// Respondent identifier (ECP: the `DIRECTORIO` column).
    pub id: String,
    /// Sampling weight; positive and finite, enforced at wave construction.
    pub weight: f64,
    /// Question code → raw answer value.
    pub answers: BTreeMap<String, AnswerValue>,
    /// Demographic attribute name → value.
    pub attributes: BTreeMap<String, AnswerValue>,
}

impl Respondent {
    /// Attribute value with absent entries read as `Null`.
    pub fn attribute(&self, name: &str) -> &AnswerValue {
        self.attributes.get(name).unwrap_or(&AnswerValue::Null)
    }
}

// ---------------------------------------------------------------------------
// WaveSchema – the declared shape of one wave's table
// ---------------------------------------------------------------------------

/// Load-time schema for one wave: which columns carry the weight, the row
/// identifier and the filterable demographics. Every remaining column is a
/// question column. The loader validates the table against this once and
/// fails fast on deviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSchema {
    pub year: u16,
    pub weight_column: String,
    pub id_column: String,
    #[serde(default)]
    pub demographics: Vec<String>,
}

// ---------------------------------------------------------------------------
// SurveyWave – the complete loaded wave
// ---------------------------------------------------------------------------

/// One fully loaded survey wave with pre-computed column indices.
/// Immutable once constructed; shared between computations via `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyWave {
    year: u16,
    respondents: Vec<Respondent>,
    /// Question codes observed across all rows.
    question_columns: BTreeSet<String>,
    /// For each demographic attribute the sorted set of observed values.
    /// Declared demographics appear even when no row carries a value.
    attribute_domains: BTreeMap<String, BTreeSet<AnswerValue>>,
    total_weight: f64,
}

impl SurveyWave {
    /// Build a wave from loaded rows, indexing columns and enforcing the
    /// weight invariant: every weight must be positive and finite.
    pub fn from_respondents(
        year: u16,
        respondents: Vec<Respondent>,
        demographics: &[String],
    ) -> CompareResult<Self> {
        let mut question_columns: BTreeSet<String> = BTreeSet::new();
        let mut attribute_domains: BTreeMap<String, BTreeSet<AnswerValue>> = demographics
            .iter()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();
        let mut total_weight = 0.0_f64;

        for r in &respondents {
            if !(r.weight.is_finite() && r.weight > 0.0) {
                return Err(CompareError::schema(format!(
                    "wave {year}: respondent '{}' has invalid weight {}",
                    r.id, r.weight
                )));
            }
            total_weight += r.weight;
            for code in r.answers.keys() {
                question_columns.insert(code.clone());
            }
            for (attr, val) in &r.attributes {
                attribute_domains
                    .entry(attr.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }

        Ok(SurveyWave {
            year,
            respondents,
            question_columns,
            attribute_domains,
            total_weight,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn respondents(&self) -> &[Respondent] {
        &self.respondents
    }

    /// Number of respondents.
    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    /// Whether the wave has no respondents.
    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }

    /// Sum of all sampling weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Whether any row answered the given question column.
    pub fn has_question(&self, code: &str) -> bool {
        self.question_columns.contains(code)
    }

    pub fn question_columns(&self) -> &BTreeSet<String> {
        &self.question_columns
    }

    /// Whether the attribute is a known (declared or observed) demographic.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_domains.contains_key(name)
    }

    pub fn attribute_domains(&self) -> &BTreeMap<String, BTreeSet<AnswerValue>> {
        &self.attribute_domains
    }
}
