use std::collections::BTreeMap;

use serde::Serialize;

use super::catalog::{MISSING_LABEL, QuestionKind, UnifiedQuestion, WaveBinding};
use crate::data::model::{AnswerValue, SurveyWave};

/// Filtered sets below this total weight are flagged insufficient instead of
/// being divided by.
const WEIGHT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Distribution of one question in one wave under one filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    /// One answer per respondent; shares include the trailing missing bucket
    /// and sum to 100 over all categories.
    Exclusive,
    /// Independent yes-shares of the filtered total; no missing bucket and
    /// no sum-to-100 property.
    MultiResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    /// Accumulated sampling weight.
    pub weight: f64,
    /// Share of the filtered total, 0–100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub question: String,
    pub year: u16,
    pub kind: DistributionKind,
    /// Canonical category order; exclusive kinds append the missing bucket.
    pub shares: Vec<CategoryShare>,
    /// Total weight of the filtered set, including respondents with missing
    /// answers.
    pub total_weight: f64,
    /// True when the filtered set carries (near-)zero weight; every percent
    /// is 0 and no delta can be computed from this distribution.
    pub insufficient_sample: bool,
}

/// Compute the weighted answer distribution of `question` over the filtered
/// rows of `wave`. `None` when the wave does not encode the question.
pub fn distribution(
    wave: &SurveyWave,
    rows: &[usize],
    question: &UnifiedQuestion,
) -> Option<Distribution> {
    let binding = question.binding(wave.year())?;
    let respondents = wave.respondents();
    let total_weight: f64 = rows.iter().map(|&i| respondents[i].weight).sum();
    let insufficient = total_weight < WEIGHT_EPSILON;

    let kind = if question.kind.is_exclusive() {
        DistributionKind::Exclusive
    } else {
        DistributionKind::MultiResponse
    };

    // Seed every category so empty ones still appear with zero weight.
    let mut order: Vec<&str> = question.categories.iter().map(String::as_str).collect();
    if kind == DistributionKind::Exclusive {
        order.push(MISSING_LABEL);
    }
    let index: BTreeMap<&str, usize> = order.iter().enumerate().map(|(i, c)| (*c, i)).collect();
    let mut weights = vec![0.0_f64; order.len()];

    match binding {
        WaveBinding::Exclusive { column, aliases } => {
            let missing_idx = order.len() - 1;
            for &i in rows {
                let r = &respondents[i];
                let value = r.answers.get(column).unwrap_or(&AnswerValue::Null);
                let category = match &question.kind {
                    QuestionKind::Binned { edges } => {
                        bin_category(edges, &question.categories, value)
                    }
                    _ => alias_category(aliases, value),
                };
                let idx = category
                    .and_then(|c| index.get(c).copied())
                    .unwrap_or(missing_idx);
                weights[idx] += r.weight;
            }
        }
        WaveBinding::Indicators { by_category } => {
            let QuestionKind::MultiResponse { marker } = question.kind else {
                return None;
            };
            for (category, columns) in by_category {
                let Some(&idx) = index.get(category.as_str()) else {
                    continue;
                };
                // Per-column accumulation: a respondent matching several
                // indicators of one category counts once per indicator.
                for column in columns {
                    for &i in rows {
                        let r = &respondents[i];
                        if let Some(v) = r.answers.get(column) {
                            if v.as_integer() == Some(marker) {
                                weights[idx] += r.weight;
                            }
                        }
                    }
                }
            }
        }
    }

    let shares = order
        .iter()
        .zip(&weights)
        .map(|(category, &weight)| CategoryShare {
            category: category.to_string(),
            weight,
            percent: if insufficient {
                0.0
            } else {
                weight / total_weight * 100.0
            },
        })
        .collect();

    Some(Distribution {
        question: question.key.clone(),
        year: wave.year(),
        kind,
        shares,
        total_weight,
        insufficient_sample: insufficient,
    })
}

/// Alias lookup with the integral-float fold: a stored `2.0` matches answer
/// code `2`.
fn alias_category<'a>(
    aliases: &'a BTreeMap<AnswerValue, String>,
    value: &AnswerValue,
) -> Option<&'a str> {
    if let Some(category) = aliases.get(value) {
        return Some(category);
    }
    if let AnswerValue::Float(_) = value {
        if let Some(i) = value.as_integer() {
            return aliases.get(&AnswerValue::Integer(i)).map(String::as_str);
        }
    }
    None
}

/// Right-closed interval lookup: value v lands in bin i when
/// `edges[i] < v <= edges[i+1]`.
fn bin_category<'a>(
    edges: &[f64],
    categories: &'a [String],
    value: &AnswerValue,
) -> Option<&'a str> {
    let v = value.as_f64()?;
    if !v.is_finite() {
        return None;
    }
    edges
        .windows(2)
        .position(|w| v > w[0] && v <= w[1])
        .map(|i| categories[i].as_str())
}

// ---------------------------------------------------------------------------
// Weighted means over scale questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleSummary {
    pub question: String,
    pub year: u16,
    /// Weighted mean over in-range values; `None` when no in-range weight.
    pub mean: Option<f64>,
    pub in_range_weight: f64,
    pub insufficient_sample: bool,
}

/// Weighted mean of a scale question over the filtered rows. Out-of-range
/// codes (a `99` on a 1–5 scale), non-numeric and missing values are
/// excluded from both numerator and denominator. `None` when the wave does
/// not encode the question or the question has no scale.
pub fn scale_mean(
    wave: &SurveyWave,
    rows: &[usize],
    question: &UnifiedQuestion,
) -> Option<ScaleSummary> {
    let QuestionKind::Scale { min, max } = question.kind else {
        return None;
    };
    let WaveBinding::Exclusive { column, .. } = question.binding(wave.year())? else {
        return None;
    };

    let respondents = wave.respondents();
    let total_weight: f64 = rows.iter().map(|&i| respondents[i].weight).sum();

    let mut weighted_sum = 0.0_f64;
    let mut in_range_weight = 0.0_f64;
    for &i in rows {
        let r = &respondents[i];
        if let Some(v) = r.answers.get(column).and_then(|v| v.as_f64()) {
            if v >= min as f64 && v <= max as f64 {
                weighted_sum += v * r.weight;
                in_range_weight += r.weight;
            }
        }
    }

    Some(ScaleSummary {
        question: question.key.clone(),
        year: wave.year(),
        mean: (in_range_weight > 0.0).then(|| weighted_sum / in_range_weight),
        in_range_weight,
        insufficient_sample: total_weight < WEIGHT_EPSILON,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Respondent;
    use std::collections::BTreeMap;

    fn wave(year: u16, cells: Vec<(f64, Vec<(&str, AnswerValue)>)>) -> SurveyWave {
        let respondents = cells
            .into_iter()
            .enumerate()
            .map(|(i, (weight, answers))| Respondent {
                id: format!("r{i}"),
                weight,
                answers: answers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                attributes: BTreeMap::new(),
            })
            .collect();
        SurveyWave::from_respondents(year, respondents, &[]).unwrap()
    }

    fn categorical_question(yes_no: &[(&str, &str)]) -> UnifiedQuestion {
        UnifiedQuestion {
            key: "q".to_string(),
            label: "q".to_string(),
            kind: QuestionKind::Categorical,
            categories: yes_no.iter().map(|(_, c)| c.to_string()).collect(),
            bindings: BTreeMap::from([(
                2019,
                WaveBinding::Exclusive {
                    column: "P".to_string(),
                    aliases: yes_no
                        .iter()
                        .map(|(code, category)| {
                            (
                                AnswerValue::Integer(code.parse().unwrap()),
                                category.to_string(),
                            )
                        })
                        .collect(),
                },
            )]),
            comparable: false,
        }
    }

    fn all_rows(wave: &SurveyWave) -> Vec<usize> {
        (0..wave.len()).collect()
    }

    #[test]
    fn sixty_forty_split() {
        let mut cells = Vec::new();
        for _ in 0..600 {
            cells.push((1.0, vec![("P", AnswerValue::Integer(1))]));
        }
        for _ in 0..400 {
            cells.push((1.0, vec![("P", AnswerValue::Integer(2))]));
        }
        let w = wave(2019, cells);
        let q = categorical_question(&[("1", "A"), ("2", "B")]);

        let dist = distribution(&w, &all_rows(&w), &q).unwrap();
        assert!(!dist.insufficient_sample);
        assert!((dist.shares[0].percent - 60.0).abs() < 1e-9);
        assert!((dist.shares[1].percent - 40.0).abs() < 1e-9);
        assert_eq!(dist.shares[2].category, MISSING_LABEL);
        assert_eq!(dist.shares[2].percent, 0.0);
    }

    #[test]
    fn exclusive_distribution_sums_to_100_with_missing_bucket() {
        let w = wave(
            2019,
            vec![
                (1.3, vec![("P", AnswerValue::Integer(1))]),
                (0.7, vec![("P", AnswerValue::Integer(2))]),
                (2.1, vec![("P", AnswerValue::Null)]),
                (0.9, vec![("P", AnswerValue::Integer(77))]), // unrecognized code
                (1.5, vec![]),                                // never answered
            ],
        );
        let q = categorical_question(&[("1", "A"), ("2", "B")]);

        let dist = distribution(&w, &all_rows(&w), &q).unwrap();
        let sum: f64 = dist.shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-6);
        let missing = dist.shares.last().unwrap();
        assert_eq!(missing.category, MISSING_LABEL);
        assert!((missing.weight - (2.1 + 0.9 + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn integral_float_folds_onto_answer_code() {
        let w = wave(
            2019,
            vec![
                (1.0, vec![("P", AnswerValue::Float(1.0))]),
                (1.0, vec![("P", AnswerValue::Float(1.5))]),
            ],
        );
        let q = categorical_question(&[("1", "A")]);

        let dist = distribution(&w, &all_rows(&w), &q).unwrap();
        assert!((dist.shares[0].percent - 50.0).abs() < 1e-9);
        assert!((dist.shares[1].percent - 50.0).abs() < 1e-9); // 1.5 → missing
    }

    #[test]
    fn empty_filtered_set_is_flagged_not_divided() {
        let w = wave(2019, vec![(1.0, vec![("P", AnswerValue::Integer(1))])]);
        let q = categorical_question(&[("1", "A")]);

        let dist = distribution(&w, &[], &q).unwrap();
        assert!(dist.insufficient_sample);
        assert!(dist.shares.iter().all(|s| s.percent == 0.0));
        assert_eq!(dist.total_weight, 0.0);
    }

    #[test]
    fn uncovered_wave_yields_no_distribution() {
        let w = wave(2023, vec![(1.0, vec![("P", AnswerValue::Integer(1))])]);
        let q = categorical_question(&[("1", "A")]); // bound to 2019 only
        assert!(distribution(&w, &all_rows(&w), &q).is_none());
    }

    #[test]
    fn bins_are_right_closed() {
        let q = UnifiedQuestion {
            key: "ideologia_grupos".to_string(),
            label: "Grupo ideológico".to_string(),
            kind: QuestionKind::Binned {
                edges: vec![0.0, 3.5, 6.5, 10.0],
            },
            categories: vec![
                "Izquierda".to_string(),
                "Centro".to_string(),
                "Derecha".to_string(),
            ],
            bindings: BTreeMap::from([(
                2019,
                WaveBinding::Exclusive {
                    column: "P5328".to_string(),
                    aliases: BTreeMap::new(),
                },
            )]),
            comparable: false,
        };
        let w = wave(
            2019,
            vec![
                (1.0, vec![("P5328", AnswerValue::Float(3.5))]),
                (1.0, vec![("P5328", AnswerValue::Float(3.6))]),
                (1.0, vec![("P5328", AnswerValue::Integer(10))]),
                (1.0, vec![("P5328", AnswerValue::Integer(12))]),
                (1.0, vec![("P5328", AnswerValue::Null)]),
            ],
        );

        let dist = distribution(&w, &all_rows(&w), &q).unwrap();
        assert!((dist.shares[0].percent - 20.0).abs() < 1e-9); // 3.5 → Izquierda
        assert!((dist.shares[1].percent - 20.0).abs() < 1e-9); // 3.6 → Centro
        assert!((dist.shares[2].percent - 20.0).abs() < 1e-9); // 10 → Derecha
        assert!((dist.shares[3].percent - 40.0).abs() < 1e-9); // 12 and null → missing
    }

    #[test]
    fn multi_response_double_counts_grouped_indicators() {
        let q = UnifiedQuestion {
            key: "razones".to_string(),
            label: "razones".to_string(),
            kind: QuestionKind::MultiResponse { marker: 1 },
            categories: vec!["Grupo".to_string()],
            bindings: BTreeMap::from([(
                2019,
                WaveBinding::Indicators {
                    by_category: BTreeMap::from([(
                        "Grupo".to_string(),
                        vec!["S1".to_string(), "S2".to_string()],
                    )]),
                },
            )]),
            comparable: false,
        };
        let w = wave(
            2019,
            vec![
                (
                    1.0,
                    vec![
                        ("S1", AnswerValue::Integer(1)),
                        ("S2", AnswerValue::Integer(1)),
                    ],
                ),
                (1.0, vec![("S1", AnswerValue::Integer(2))]),
            ],
        );

        let dist = distribution(&w, &all_rows(&w), &q).unwrap();
        assert_eq!(dist.kind, DistributionKind::MultiResponse);
        // First respondent counts once per matching indicator: 2.0 of 2.0.
        assert!((dist.shares[0].percent - 100.0).abs() < 1e-9);
        assert!(dist.shares.iter().all(|s| s.category != MISSING_LABEL));
    }

    #[test]
    fn scale_mean_masks_out_of_range_codes() {
        let q = UnifiedQuestion {
            key: "importancia".to_string(),
            label: "importancia".to_string(),
            kind: QuestionKind::Scale { min: 1, max: 5 },
            categories: (1..=5).map(|v| v.to_string()).collect(),
            bindings: BTreeMap::from([(
                2019,
                WaveBinding::Exclusive {
                    column: "P".to_string(),
                    aliases: (1..=5)
                        .map(|v| (AnswerValue::Integer(v), v.to_string()))
                        .collect(),
                },
            )]),
            comparable: false,
        };
        let w = wave(
            2019,
            vec![
                (2.0, vec![("P", AnswerValue::Integer(4))]),
                (1.0, vec![("P", AnswerValue::Integer(1))]),
                (5.0, vec![("P", AnswerValue::Integer(99))]), // NS/NR, masked
                (3.0, vec![("P", AnswerValue::Null)]),
            ],
        );

        let summary = scale_mean(&w, &all_rows(&w), &q).unwrap();
        assert!((summary.mean.unwrap() - 3.0).abs() < 1e-9); // (8 + 1) / 3
        assert!((summary.in_range_weight - 3.0).abs() < 1e-9);

        // All rows out of range → no mean, not a sentinel zero.
        let masked_rows = vec![2, 3];
        let summary = scale_mean(&w, &masked_rows, &q).unwrap();
        assert_eq!(summary.mean, None);
    }

    #[test]
    fn identical_inputs_yield_equal_distributions() {
        let w = wave(
            2019,
            vec![
                (1.0, vec![("P", AnswerValue::Integer(1))]),
                (2.0, vec![("P", AnswerValue::Integer(2))]),
            ],
        );
        let q = categorical_question(&[("1", "A"), ("2", "B")]);
        let rows = all_rows(&w);
        assert_eq!(
            distribution(&w, &rows, &q).unwrap(),
            distribution(&w, &rows, &q).unwrap()
        );
    }
}
