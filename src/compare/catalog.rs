use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::config::{CatalogConfig, QuestionConfig, WaveBindingConfig};
use crate::data::loader::guess_cell;
use crate::data::model::{AnswerValue, SurveyWave};
use crate::error::{CompareError, CompareResult};

/// Reserved label for the bucket of absent, null and unrecognized answers of
/// exclusive questions. Cannot be declared as a canonical category.
pub const MISSING_LABEL: &str = "Sin dato";

// ---------------------------------------------------------------------------
// Question taxonomy
// ---------------------------------------------------------------------------

/// Aggregation shape of a unified question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// One coded column per wave; raw codes map onto canonical categories
    /// through the wave's alias table.
    Categorical,
    /// One indicator column (or several) per category; every indicator cell
    /// equal to the marker code contributes the respondent's weight, so a
    /// respondent matching two indicators of one category counts twice.
    MultiResponse { marker: i64 },
    /// Integer scale column. The scale points are the categories, and the
    /// question additionally yields a weighted mean over in-range values.
    Scale { min: i64, max: i64 },
    /// Numeric column cut into right-closed intervals `(e0,e1], (e1,e2], …`,
    /// one per category. Values at or below the first edge, above the last,
    /// or non-numeric land in the missing bucket.
    Binned { edges: Vec<f64> },
}

impl QuestionKind {
    /// Whether categories are mutually exclusive (one answer per respondent).
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, QuestionKind::MultiResponse { .. })
    }
}

/// How one wave encodes a unified question.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveBinding {
    /// A single column whose raw codes map onto canonical categories.
    /// Binned questions carry an empty alias table; bin assignment is
    /// numeric.
    Exclusive {
        column: String,
        aliases: BTreeMap<AnswerValue, String>,
    },
    /// Canonical category → indicator columns present in the wave.
    Indicators {
        by_category: BTreeMap<String, Vec<String>>,
    },
}

/// One entry of the unified question taxonomy, resolved against both waves.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedQuestion {
    pub key: String,
    pub label: String,
    pub kind: QuestionKind,
    /// Canonical categories in presentation order. Scale categories are the
    /// scale points, derived at reconcile time.
    pub categories: Vec<String>,
    /// Wave year → resolved binding. Years with no resolved columns are
    /// absent.
    pub bindings: BTreeMap<u16, WaveBinding>,
    /// True when the question resolved in both waves and can yield a delta.
    pub comparable: bool,
}

impl UnifiedQuestion {
    pub fn binding(&self, year: u16) -> Option<&WaveBinding> {
        self.bindings.get(&year)
    }

    /// Whether the wave encodes this question at all.
    pub fn covers(&self, year: u16) -> bool {
        self.bindings.contains_key(&year)
    }
}

/// A configured question that resolved in neither wave. Recorded, never
/// fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedQuestion {
    pub key: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// The reconciled catalog: every configured question resolved against both
/// waves' column sets, in configuration order.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCatalog {
    questions: Vec<UnifiedQuestion>,
    index: BTreeMap<String, usize>,
    dropped: Vec<DroppedQuestion>,
}

impl QuestionCatalog {
    /// Resolve the hand-authored configuration against the two waves.
    ///
    /// A question bound in only one wave is kept but flagged not-comparable;
    /// a question bound in neither wave is dropped with a warning. Invalid
    /// configuration (unknown alias categories, bad bin edges, the reserved
    /// missing label declared as a category) fails fast.
    pub fn reconcile(
        config: &CatalogConfig,
        before: &SurveyWave,
        after: &SurveyWave,
    ) -> CompareResult<QuestionCatalog> {
        let mut questions = Vec::new();
        let mut index = BTreeMap::new();
        let mut dropped = Vec::new();

        for qc in &config.questions {
            if index.contains_key(&qc.key) {
                return Err(CompareError::schema(format!(
                    "catalog declares question '{}' twice",
                    qc.key
                )));
            }
            let categories = effective_categories(qc)?;

            let mut bindings = BTreeMap::new();
            for (&year, wb) in &qc.waves {
                let wave = if year == before.year() {
                    before
                } else if year == after.year() {
                    after
                } else {
                    return Err(CompareError::schema(format!(
                        "question '{}' binds wave {year}, but the engine compares {} and {}",
                        qc.key,
                        before.year(),
                        after.year()
                    )));
                };
                if let Some(binding) = resolve_binding(qc, wb, &categories, wave)? {
                    bindings.insert(year, binding);
                }
            }

            if bindings.is_empty() {
                warn!(
                    "question '{}' ({}) resolved in neither wave; dropping",
                    qc.key, qc.label
                );
                dropped.push(DroppedQuestion {
                    key: qc.key.clone(),
                    label: qc.label.clone(),
                });
                continue;
            }

            let comparable =
                bindings.contains_key(&before.year()) && bindings.contains_key(&after.year());
            index.insert(qc.key.clone(), questions.len());
            questions.push(UnifiedQuestion {
                key: qc.key.clone(),
                label: qc.label.clone(),
                kind: qc.kind.clone(),
                categories,
                bindings,
                comparable,
            });
        }

        info!(
            "reconciled catalog: {} questions ({} comparable), {} dropped",
            questions.len(),
            questions.iter().filter(|q| q.comparable).count(),
            dropped.len()
        );
        Ok(QuestionCatalog {
            questions,
            index,
            dropped,
        })
    }

    /// Catalog entries in configuration order.
    pub fn questions(&self) -> &[UnifiedQuestion] {
        &self.questions
    }

    pub fn get(&self, key: &str) -> Option<&UnifiedQuestion> {
        self.index.get(key).map(|&i| &self.questions[i])
    }

    /// Questions that resolved in neither wave.
    pub fn dropped(&self) -> &[DroppedQuestion] {
        &self.dropped
    }
}

/// Validate the kind-specific configuration and return the canonical
/// category order (derived from the range for scales).
fn effective_categories(qc: &QuestionConfig) -> CompareResult<Vec<String>> {
    let categories = match &qc.kind {
        QuestionKind::Scale { min, max } => {
            if min >= max {
                return Err(CompareError::schema(format!(
                    "question '{}': scale range {min}..{max} is empty",
                    qc.key
                )));
            }
            if !qc.categories.is_empty() {
                return Err(CompareError::schema(format!(
                    "question '{}': scale categories are derived from the range",
                    qc.key
                )));
            }
            (*min..=*max).map(|v| v.to_string()).collect()
        }
        QuestionKind::Binned { edges } => {
            if edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(CompareError::schema(format!(
                    "question '{}': bin edges must be strictly increasing",
                    qc.key
                )));
            }
            if edges.len() != qc.categories.len() + 1 {
                return Err(CompareError::schema(format!(
                    "question '{}': {} bin edges need {} categories, got {}",
                    qc.key,
                    edges.len(),
                    edges.len().saturating_sub(1),
                    qc.categories.len()
                )));
            }
            qc.categories.clone()
        }
        QuestionKind::Categorical | QuestionKind::MultiResponse { .. } => {
            if qc.categories.is_empty() {
                return Err(CompareError::schema(format!(
                    "question '{}': no categories declared",
                    qc.key
                )));
            }
            qc.categories.clone()
        }
    };

    if categories.iter().any(|c| c == MISSING_LABEL) {
        return Err(CompareError::schema(format!(
            "question '{}': '{MISSING_LABEL}' is reserved for the missing bucket",
            qc.key
        )));
    }
    let mut seen = std::collections::BTreeSet::new();
    for c in &categories {
        if !seen.insert(c) {
            return Err(CompareError::schema(format!(
                "question '{}': duplicate category '{c}'",
                qc.key
            )));
        }
    }
    Ok(categories)
}

/// Resolve one wave's binding configuration. `Ok(None)` means the wave does
/// not encode the question.
fn resolve_binding(
    qc: &QuestionConfig,
    wb: &WaveBindingConfig,
    categories: &[String],
    wave: &SurveyWave,
) -> CompareResult<Option<WaveBinding>> {
    match &qc.kind {
        QuestionKind::MultiResponse { .. } => {
            if wb.column.is_some() || !wb.codes.is_empty() {
                return Err(CompareError::schema(format!(
                    "question '{}' wave {}: multi-response bindings take indicators, not a column",
                    qc.key,
                    wave.year()
                )));
            }
            if wb.indicators.is_empty() {
                return Err(CompareError::schema(format!(
                    "question '{}' wave {}: no indicator columns declared",
                    qc.key,
                    wave.year()
                )));
            }
            for category in wb.indicators.keys() {
                if !categories.iter().any(|c| c == category) {
                    return Err(CompareError::schema(format!(
                        "question '{}' wave {}: indicators name unknown category '{category}'",
                        qc.key,
                        wave.year()
                    )));
                }
            }
            // Absent indicator columns contribute zero weight; the wave
            // covers the question when at least one indicator resolves.
            let by_category: BTreeMap<String, Vec<String>> = wb
                .indicators
                .iter()
                .map(|(category, columns)| {
                    let present: Vec<String> = columns
                        .iter()
                        .filter(|c| wave.has_question(c))
                        .cloned()
                        .collect();
                    (category.clone(), present)
                })
                .filter(|(_, present)| !present.is_empty())
                .collect();
            if by_category.is_empty() {
                return Ok(None);
            }
            Ok(Some(WaveBinding::Indicators { by_category }))
        }
        kind => {
            if !wb.indicators.is_empty() {
                return Err(CompareError::schema(format!(
                    "question '{}' wave {}: indicators only apply to multi-response questions",
                    qc.key,
                    wave.year()
                )));
            }
            let column = wb.column.as_ref().ok_or_else(|| {
                CompareError::schema(format!(
                    "question '{}' wave {}: missing source column",
                    qc.key,
                    wave.year()
                ))
            })?;

            let aliases = match kind {
                QuestionKind::Categorical => {
                    if wb.codes.is_empty() {
                        return Err(CompareError::schema(format!(
                            "question '{}' wave {}: no answer codes declared",
                            qc.key,
                            wave.year()
                        )));
                    }
                    let mut aliases = BTreeMap::new();
                    for (code, category) in &wb.codes {
                        if !categories.iter().any(|c| c == category) {
                            return Err(CompareError::schema(format!(
                                "question '{}' wave {}: code '{code}' maps to unknown category '{category}'",
                                qc.key,
                                wave.year()
                            )));
                        }
                        if aliases.insert(guess_cell(code), category.clone()).is_some() {
                            return Err(CompareError::schema(format!(
                                "question '{}' wave {}: duplicate answer code '{code}'",
                                qc.key,
                                wave.year()
                            )));
                        }
                    }
                    aliases
                }
                QuestionKind::Scale { min, max } => {
                    if !wb.codes.is_empty() {
                        return Err(CompareError::schema(format!(
                            "question '{}' wave {}: scale codes are derived from the range",
                            qc.key,
                            wave.year()
                        )));
                    }
                    (*min..=*max)
                        .map(|v| (AnswerValue::Integer(v), v.to_string()))
                        .collect()
                }
                QuestionKind::Binned { .. } => {
                    if !wb.codes.is_empty() {
                        return Err(CompareError::schema(format!(
                            "question '{}' wave {}: binned questions take no answer codes",
                            qc.key,
                            wave.year()
                        )));
                    }
                    BTreeMap::new()
                }
                QuestionKind::MultiResponse { .. } => unreachable!("handled above"),
            };

            if !wave.has_question(column) {
                return Ok(None);
            }
            Ok(Some(WaveBinding::Exclusive {
                column: column.clone(),
                aliases,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Respondent;

    fn wave_with(year: u16, columns: &[&str]) -> SurveyWave {
        let answers: BTreeMap<String, AnswerValue> = columns
            .iter()
            .map(|c| (c.to_string(), AnswerValue::Integer(1)))
            .collect();
        let respondents = vec![Respondent {
            id: "r1".to_string(),
            weight: 1.0,
            answers,
            attributes: BTreeMap::new(),
        }];
        SurveyWave::from_respondents(year, respondents, &[]).unwrap()
    }

    fn categorical(key: &str, column: &str, years: &[u16]) -> QuestionConfig {
        let wb = WaveBindingConfig {
            column: Some(column.to_string()),
            codes: BTreeMap::from([
                ("1".to_string(), "Sí".to_string()),
                ("2".to_string(), "No".to_string()),
            ]),
            indicators: BTreeMap::new(),
        };
        QuestionConfig {
            key: key.to_string(),
            label: key.to_string(),
            kind: QuestionKind::Categorical,
            categories: vec!["Sí".to_string(), "No".to_string()],
            waves: years.iter().map(|&y| (y, wb.clone())).collect(),
        }
    }

    #[test]
    fn unbound_question_is_dropped_with_record() {
        let config = CatalogConfig {
            questions: vec![
                categorical("present", "P6933", &[2019, 2023]),
                categorical("ghost", "P0000", &[2019, 2023]),
            ],
        };
        let before = wave_with(2019, &["P6933"]);
        let after = wave_with(2023, &["P6933"]);

        let catalog = QuestionCatalog::reconcile(&config, &before, &after).unwrap();
        assert_eq!(catalog.questions().len(), 1);
        assert!(catalog.get("present").is_some());
        assert_eq!(catalog.dropped().len(), 1);
        assert_eq!(catalog.dropped()[0].key, "ghost");
    }

    #[test]
    fn one_wave_question_is_registered_not_comparable() {
        let config = CatalogConfig {
            questions: vec![categorical("after_only", "P9999", &[2023])],
        };
        let before = wave_with(2019, &["P6933"]);
        let after = wave_with(2023, &["P9999"]);

        let catalog = QuestionCatalog::reconcile(&config, &before, &after).unwrap();
        let q = catalog.get("after_only").unwrap();
        assert!(!q.comparable);
        assert!(!q.covers(2019));
        assert!(q.covers(2023));
    }

    #[test]
    fn alias_table_round_trips_to_configured_codes() {
        let config = CatalogConfig {
            questions: vec![categorical("q", "P6933", &[2019, 2023])],
        };
        let before = wave_with(2019, &["P6933"]);
        let after = wave_with(2023, &["P6933"]);

        let catalog = QuestionCatalog::reconcile(&config, &before, &after).unwrap();
        let q = catalog.get("q").unwrap();
        let WaveBinding::Exclusive { aliases, .. } = q.binding(2019).unwrap() else {
            panic!("expected exclusive binding");
        };
        // Inverting the alias table recovers the raw code mapping exactly.
        let recovered: BTreeMap<String, String> = aliases
            .iter()
            .map(|(code, category)| (code.to_string(), category.clone()))
            .collect();
        assert_eq!(
            recovered,
            BTreeMap::from([
                ("1".to_string(), "Sí".to_string()),
                ("2".to_string(), "No".to_string()),
            ])
        );
    }

    #[test]
    fn scale_categories_are_derived() {
        let config = CatalogConfig {
            questions: vec![QuestionConfig {
                key: "scale".to_string(),
                label: "scale".to_string(),
                kind: QuestionKind::Scale { min: 1, max: 5 },
                categories: vec![],
                waves: BTreeMap::from([(
                    2019,
                    WaveBindingConfig {
                        column: Some("P5321S1".to_string()),
                        ..Default::default()
                    },
                )]),
            }],
        };
        let before = wave_with(2019, &["P5321S1"]);
        let after = wave_with(2023, &["P6933"]);

        let catalog = QuestionCatalog::reconcile(&config, &before, &after).unwrap();
        let q = catalog.get("scale").unwrap();
        assert_eq!(q.categories, vec!["1", "2", "3", "4", "5"]);
        let WaveBinding::Exclusive { aliases, .. } = q.binding(2019).unwrap() else {
            panic!("expected exclusive binding");
        };
        assert_eq!(aliases[&AnswerValue::Integer(3)], "3");
    }

    #[test]
    fn reserved_missing_label_is_rejected() {
        let mut qc = categorical("q", "P6933", &[2019, 2023]);
        qc.categories.push(MISSING_LABEL.to_string());
        let config = CatalogConfig {
            questions: vec![qc],
        };
        let before = wave_with(2019, &["P6933"]);
        let after = wave_with(2023, &["P6933"]);

        let err = QuestionCatalog::reconcile(&config, &before, &after).expect_err("must fail");
        assert!(matches!(err, CompareError::SchemaMismatch { .. }));
    }

    #[test]
    fn bad_bin_edges_are_rejected() {
        let config = CatalogConfig {
            questions: vec![QuestionConfig {
                key: "bins".to_string(),
                label: "bins".to_string(),
                kind: QuestionKind::Binned {
                    edges: vec![0.0, 3.5, 3.5, 10.0],
                },
                categories: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                waves: BTreeMap::from([(
                    2019,
                    WaveBindingConfig {
                        column: Some("P5328".to_string()),
                        ..Default::default()
                    },
                )]),
            }],
        };
        let before = wave_with(2019, &["P5328"]);
        let after = wave_with(2023, &["P5328"]);

        let err = QuestionCatalog::reconcile(&config, &before, &after).expect_err("must fail");
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn multi_response_keeps_only_present_indicators() {
        let config = CatalogConfig {
            questions: vec![QuestionConfig {
                key: "reasons".to_string(),
                label: "reasons".to_string(),
                kind: QuestionKind::MultiResponse { marker: 1 },
                categories: vec!["a".to_string(), "b".to_string()],
                waves: BTreeMap::from([(
                    2019,
                    WaveBindingConfig {
                        indicators: BTreeMap::from([
                            (
                                "a".to_string(),
                                vec!["P1".to_string(), "P_GONE".to_string()],
                            ),
                            ("b".to_string(), vec!["P_GONE2".to_string()]),
                        ]),
                        ..Default::default()
                    },
                )]),
            }],
        };
        let before = wave_with(2019, &["P1"]);
        let after = wave_with(2023, &["P1"]);

        let catalog = QuestionCatalog::reconcile(&config, &before, &after).unwrap();
        let q = catalog.get("reasons").unwrap();
        let WaveBinding::Indicators { by_category } = q.binding(2019).unwrap() else {
            panic!("expected indicator binding");
        };
        assert_eq!(by_category["a"], vec!["P1".to_string()]);
        // Categories whose indicators are all absent carry no columns.
        assert!(!by_category.contains_key("b"));
    }

    #[test]
    fn foreign_wave_year_is_a_config_error() {
        let config = CatalogConfig {
            questions: vec![categorical("q", "P6933", &[2010])],
        };
        let before = wave_with(2019, &["P6933"]);
        let after = wave_with(2023, &["P6933"]);

        let err = QuestionCatalog::reconcile(&config, &before, &after).expect_err("must fail");
        assert!(err.to_string().contains("binds wave 2010"));
    }
}
