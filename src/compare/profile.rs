use std::collections::BTreeSet;

use serde::Serialize;

use crate::data::model::{AnswerValue, SurveyWave};

// ---------------------------------------------------------------------------
// Missingness per column per wave
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissingness {
    pub column: String,
    /// Unweighted share of rows with no value, 0–100, per wave. A column
    /// absent from a wave reports 0.
    pub before_percent: f64,
    pub after_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveCounts {
    pub year: u16,
    pub rows: usize,
    /// Question and demographic columns plus the id and weight columns.
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingnessReport {
    pub before: WaveCounts,
    pub after: WaveCounts,
    /// Every column of either wave, sorted by before-wave share descending,
    /// then column name.
    pub columns: Vec<ColumnMissingness>,
}

/// Profile the share of missing values per column across both waves.
pub fn missingness_report(before: &SurveyWave, after: &SurveyWave) -> MissingnessReport {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for wave in [before, after] {
        names.extend(wave.question_columns().iter().map(String::as_str));
        names.extend(wave.attribute_domains().keys().map(String::as_str));
    }

    let mut columns: Vec<ColumnMissingness> = names
        .into_iter()
        .map(|name| ColumnMissingness {
            column: name.to_string(),
            before_percent: missing_share(before, name),
            after_percent: missing_share(after, name),
        })
        .collect();
    columns.sort_by(|a, b| {
        b.before_percent
            .total_cmp(&a.before_percent)
            .then_with(|| a.column.cmp(&b.column))
    });

    MissingnessReport {
        before: counts(before),
        after: counts(after),
        columns,
    }
}

fn counts(wave: &SurveyWave) -> WaveCounts {
    WaveCounts {
        year: wave.year(),
        rows: wave.len(),
        columns: wave.question_columns().len() + wave.attribute_domains().len() + 2,
    }
}

fn missing_share(wave: &SurveyWave, column: &str) -> f64 {
    if wave.is_empty() {
        return 0.0;
    }
    let is_question = wave.has_question(column);
    let is_attribute = wave.has_attribute(column);
    if !is_question && !is_attribute {
        return 0.0;
    }
    let missing = wave
        .respondents()
        .iter()
        .filter(|r| {
            let value = if is_question {
                r.answers.get(column)
            } else {
                r.attributes.get(column)
            };
            value.map_or(true, AnswerValue::is_null)
        })
        .count();
    missing as f64 / wave.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Respondent;
    use std::collections::BTreeMap;

    fn wave(year: u16, answers_per_row: Vec<Vec<(&str, AnswerValue)>>) -> SurveyWave {
        let respondents = answers_per_row
            .into_iter()
            .enumerate()
            .map(|(i, answers)| Respondent {
                id: format!("r{i}"),
                weight: 1.0,
                answers: answers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                attributes: BTreeMap::new(),
            })
            .collect();
        SurveyWave::from_respondents(year, respondents, &[]).unwrap()
    }

    #[test]
    fn shares_reflect_injected_nulls() {
        let before = wave(
            2019,
            vec![
                vec![("P1", AnswerValue::Integer(1)), ("P2", AnswerValue::Null)],
                vec![("P1", AnswerValue::Null), ("P2", AnswerValue::Null)],
                vec![("P1", AnswerValue::Integer(2)), ("P2", AnswerValue::Null)],
                vec![("P1", AnswerValue::Integer(3))], // P2 absent from the row
            ],
        );
        let after = wave(2023, vec![vec![("P1", AnswerValue::Integer(1))]]);

        let report = missingness_report(&before, &after);
        assert_eq!(report.before.rows, 4);
        assert_eq!(report.after.rows, 1);

        // Sorted by before-share descending: P2 (100%) first, then P1 (25%).
        assert_eq!(report.columns[0].column, "P2");
        assert!((report.columns[0].before_percent - 100.0).abs() < 1e-9);
        assert_eq!(report.columns[1].column, "P1");
        assert!((report.columns[1].before_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn column_absent_from_a_wave_reports_zero() {
        let before = wave(2019, vec![vec![("P_2019_ONLY", AnswerValue::Null)]]);
        let after = wave(2023, vec![vec![("P_2023_ONLY", AnswerValue::Null)]]);

        let report = missingness_report(&before, &after);
        let only_before = report
            .columns
            .iter()
            .find(|c| c.column == "P_2019_ONLY")
            .unwrap();
        assert!((only_before.before_percent - 100.0).abs() < 1e-9);
        assert_eq!(only_before.after_percent, 0.0);
    }

    #[test]
    fn ties_fall_back_to_column_name_order() {
        let before = wave(
            2019,
            vec![vec![
                ("PB", AnswerValue::Integer(1)),
                ("PA", AnswerValue::Integer(1)),
            ]],
        );
        let after = wave(2023, vec![vec![]]);

        let report = missingness_report(&before, &after);
        let names: Vec<&str> = report.columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["PA", "PB"]);
    }
}
