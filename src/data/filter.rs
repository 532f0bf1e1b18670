use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::model::{AnswerValue, SurveyWave};
use crate::error::{CompareError, CompareResult};

// ---------------------------------------------------------------------------
// Filter predicate: which demographic values are selected per attribute
// ---------------------------------------------------------------------------

/// User-selected demographic constraints: attribute name → allowed values.
/// Constraints AND across attributes and OR within an attribute's set; an
/// empty map means "no filter" (every respondent passes).
pub type FilterSpec = BTreeMap<String, BTreeSet<AnswerValue>>;

/// Return indices of respondents satisfying every constraint, in original
/// row order. The wave itself is never touched.
///
/// A respondent passes an attribute constraint when:
/// * its value for the attribute is in the allowed set → passes
/// * the allowed set is empty → nothing selected → fails
/// * it has no value for the attribute → reads as `Null`, passes only when
///   `Null` is explicitly allowed
///
/// Naming an attribute the wave does not declare is a typed
/// [`CompareError::InvalidFilter`], never a silent empty result. Allowed
/// values outside the attribute's observed domain are legal and simply match
/// nobody.
pub fn filtered_indices(wave: &SurveyWave, spec: &FilterSpec) -> CompareResult<Vec<usize>> {
    for attribute in spec.keys() {
        if !wave.has_attribute(attribute) {
            return Err(CompareError::InvalidFilter {
                attribute: attribute.clone(),
            });
        }
    }

    let indices: Vec<usize> = wave
        .respondents()
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            spec.iter()
                .all(|(attribute, allowed)| allowed.contains(r.attribute(attribute)))
        })
        .map(|(i, _)| i)
        .collect();

    debug!(
        "filter matched {}/{} rows of wave {}",
        indices.len(),
        wave.len(),
        wave.year()
    );
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Respondent;

    fn wave() -> SurveyWave {
        let rows = vec![
            ("a", "11", Some(1)),
            ("b", "25", Some(2)),
            ("c", "11", Some(1)),
            ("d", "05", None),
        ];
        let respondents = rows
            .into_iter()
            .map(|(id, dpto, area)| {
                let mut attributes = BTreeMap::from([(
                    "DPTO".to_string(),
                    AnswerValue::String(dpto.to_string()),
                )]);
                if let Some(area) = area {
                    attributes.insert("AREA".to_string(), AnswerValue::Integer(area));
                } else {
                    attributes.insert("AREA".to_string(), AnswerValue::Null);
                }
                Respondent {
                    id: id.to_string(),
                    weight: 1.0,
                    answers: BTreeMap::new(),
                    attributes,
                }
            })
            .collect();
        SurveyWave::from_respondents(
            2019,
            respondents,
            &["DPTO".to_string(), "AREA".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn empty_spec_returns_all_rows_in_order() {
        let w = wave();
        let got = filtered_indices(&w, &FilterSpec::new()).unwrap();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn and_across_attributes_or_within_one() {
        let w = wave();
        let spec = FilterSpec::from([
            (
                "DPTO".to_string(),
                BTreeSet::from([
                    AnswerValue::String("11".to_string()),
                    AnswerValue::String("25".to_string()),
                ]),
            ),
            ("AREA".to_string(), BTreeSet::from([AnswerValue::Integer(1)])),
        ]);
        assert_eq!(filtered_indices(&w, &spec).unwrap(), vec![0, 2]);
    }

    #[test]
    fn unknown_attribute_is_a_typed_error() {
        let w = wave();
        let spec = FilterSpec::from([(
            "REGION".to_string(),
            BTreeSet::from([AnswerValue::String("Norte".to_string())]),
        )]);
        let err = filtered_indices(&w, &spec).expect_err("must fail fast");
        assert!(matches!(err, CompareError::InvalidFilter { attribute } if attribute == "REGION"));
    }

    #[test]
    fn unknown_value_of_known_attribute_matches_nobody() {
        let w = wave();
        let spec = FilterSpec::from([(
            "DPTO".to_string(),
            BTreeSet::from([AnswerValue::String("99".to_string())]),
        )]);
        assert!(filtered_indices(&w, &spec).unwrap().is_empty());
    }

    #[test]
    fn empty_allowed_set_matches_nothing() {
        let w = wave();
        let spec = FilterSpec::from([("DPTO".to_string(), BTreeSet::new())]);
        assert!(filtered_indices(&w, &spec).unwrap().is_empty());
    }

    #[test]
    fn null_must_be_selected_explicitly() {
        let w = wave();
        let spec = FilterSpec::from([("AREA".to_string(), BTreeSet::from([AnswerValue::Null]))]);
        assert_eq!(filtered_indices(&w, &spec).unwrap(), vec![3]);
    }
}
