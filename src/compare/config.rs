use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::QuestionKind;
use crate::data::model::WaveSchema;

// ---------------------------------------------------------------------------
// Hand-authored catalog configuration
// ---------------------------------------------------------------------------

/// The question taxonomy as authored: which raw columns and codes each wave
/// uses for each unified question. Static, data-dependent configuration;
/// reconciliation applies it and validates completeness, never infers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub questions: Vec<QuestionConfig>,
}

impl CatalogConfig {
    pub fn from_json_str(text: &str) -> serde_json::Result<CatalogConfig> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub key: String,
    pub label: String,
    pub kind: QuestionKind,
    /// Canonical categories in presentation order. Empty for scales, whose
    /// categories are derived from the range.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Wave year → binding. A year may be missing when the wave never asked
    /// the question.
    pub waves: BTreeMap<u16, WaveBindingConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveBindingConfig {
    /// Source column for categorical, scale and binned questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Raw answer code (typed like a CSV cell) → canonical category.
    /// Categorical questions only; waves may use different codes for the
    /// same category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub codes: BTreeMap<String, String>,
    /// Canonical category → indicator columns. Multi-response only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indicators: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Builtin ECP configuration
// ---------------------------------------------------------------------------

/// Wave schema of the ECP microdata files: `WEIGHT` sampling weights,
/// `DIRECTORIO` respondent ids, department / urban-rural / sex demographics.
pub fn builtin_schema(year: u16) -> WaveSchema {
    WaveSchema {
        year,
        weight_column: "WEIGHT".to_string(),
        id_column: "DIRECTORIO".to_string(),
        demographics: vec!["DPTO".to_string(), "AREA".to_string(), "P220".to_string()],
    }
}

fn both_waves(wb: WaveBindingConfig) -> BTreeMap<u16, WaveBindingConfig> {
    BTreeMap::from([(2019, wb.clone()), (2023, wb)])
}

fn column_of(name: &str) -> WaveBindingConfig {
    WaveBindingConfig {
        column: Some(name.to_string()),
        ..Default::default()
    }
}

fn categorical(
    key: &str,
    label: &str,
    column: &str,
    codes: &[(&str, &str)],
    order: &[&str],
) -> QuestionConfig {
    QuestionConfig {
        key: key.to_string(),
        label: label.to_string(),
        kind: QuestionKind::Categorical,
        categories: order.iter().map(|c| c.to_string()).collect(),
        waves: both_waves(WaveBindingConfig {
            column: Some(column.to_string()),
            codes: codes
                .iter()
                .map(|(code, category)| (code.to_string(), category.to_string()))
                .collect(),
            ..Default::default()
        }),
    }
}

/// A multi-response question with one indicator column per category.
fn reasons(key: &str, label: &str, vars: &[(&str, &str)]) -> QuestionConfig {
    QuestionConfig {
        key: key.to_string(),
        label: label.to_string(),
        kind: QuestionKind::MultiResponse { marker: 1 },
        categories: vars.iter().map(|(_, category)| category.to_string()).collect(),
        waves: both_waves(WaveBindingConfig {
            indicators: vars
                .iter()
                .map(|(column, category)| (category.to_string(), vec![column.to_string()]))
                .collect(),
            ..Default::default()
        }),
    }
}

/// The ECP 2019-vs-2023 question taxonomy, transcribed from the survey's
/// question dictionaries.
pub fn builtin_catalog() -> CatalogConfig {
    let mut questions = Vec::new();

    questions.push(categorical(
        "participacion",
        "¿Votó en las presidenciales de 2018/2022?",
        "P6933",
        &[("1", "Sí votó"), ("2", "No votó"), ("99", "NS/NR")],
        &["Sí votó", "No votó", "NS/NR"],
    ));

    questions.push(reasons(
        "razones_no_voto",
        "Razones para NO votar",
        &[
            ("P5336S1", "< 18 años"),
            ("P5336S2", "No cédula"),
            ("P5336S6", "Políticos son corruptos"),
            (
                "P5336S7",
                "Los partidos o movimientos políticos no representan a los ciudadanos",
            ),
            ("P5336S8", "Los candidatos prometen y no cumplen"),
            ("P5336S10", "Falta de credibilidad en el proceso electoral"),
            ("P5336S11", "Desinterés"),
            ("P5336S13", "Inseguridad"),
            ("P5336S14", "Falta de puestos de votación"),
            ("P5336S15", "Dificultad de acceso"),
            (
                "P5336S17",
                "Costos de transporte en que se incurre para registrarse o para votar",
            ),
            (
                "P5336S19",
                "Desinformación de como votar (falta de pedagogía electoral)",
            ),
            ("P5336S12", "Otra"),
        ],
    ));

    // The same indicators regrouped into four motive families. A respondent
    // naming two motives of one family counts twice, as in the source
    // aggregation.
    questions.push(QuestionConfig {
        key: "razones_no_voto_agrupadas".to_string(),
        label: "Razones agrupadas para NO votar".to_string(),
        kind: QuestionKind::MultiResponse { marker: 1 },
        categories: vec![
            "Animadversión política".to_string(),
            "Dificultad logística".to_string(),
            "Menor ó Cedula".to_string(),
            "Otra".to_string(),
        ],
        waves: both_waves(WaveBindingConfig {
            indicators: BTreeMap::from([
                (
                    "Animadversión política".to_string(),
                    ["P5336S6", "P5336S7", "P5336S8", "P5336S10", "P5336S19", "P5336S11"]
                        .map(String::from)
                        .to_vec(),
                ),
                (
                    "Dificultad logística".to_string(),
                    ["P5336S14", "P5336S15", "P5336S17", "P5336S13"]
                        .map(String::from)
                        .to_vec(),
                ),
                (
                    "Menor ó Cedula".to_string(),
                    ["P5336S1", "P5336S2"].map(String::from).to_vec(),
                ),
                ("Otra".to_string(), vec!["P5336S12".to_string()]),
            ]),
            ..Default::default()
        }),
    });

    questions.push(reasons(
        "razones_voto",
        "Razones para votar en presidenciales",
        &[
            ("P5337S1", "Apoyo al candidato"),
            ("P5337S2", "Programa de gobierno"),
            ("P5337S3", "Ideología política"),
            ("P5337S4", "Responsabilidad ciudadana"),
            ("P5337S5", "Influencia familiar/social"),
        ],
    ));

    questions.push(reasons(
        "dificultades_voto",
        "Dificultades al momento de votar",
        &[
            ("P5338S1", "Mesa lejana"),
            ("P5338S2", "Colas largas"),
            ("P5338S3", "Falla de cédula"),
            ("P5338S4", "Horario inconveniente"),
            ("P5338S5", "Barreras físicas"),
        ],
    ));

    questions.push(reasons(
        "transparencia_conteo",
        "Transparencia del conteo de votos",
        &[
            ("P5339S1", "Transparencia a nivel municipal"),
            ("P5339S2", "Transparencia a nivel departamental"),
            ("P5339S3", "Transparencia a nivel nacional"),
        ],
    ));

    questions.push(categorical(
        "identificacion_partidista",
        "¿Se identifica con algún partido o movimiento político?",
        "P5323",
        &[("1", "Sí"), ("2", "No"), ("99", "NS/NR")],
        &["Sí", "No", "NS/NR"],
    ));

    questions.push(reasons(
        "razones_no_identificacion",
        "Razones para no identificarse con un partido",
        &[
            ("P5324S2", "Falta de credibilidad en los partidos"),
            ("P5324S3", "Desinterés"),
            ("P5324S4", "La política se puede hacer por otras vías"),
            ("P5324S6", "Promesas incumplidas"),
            ("P5324S7", "Escándalos de corrupción"),
            (
                "P5324S8",
                "Persiguen intereses diferentes al bienestar de la comunidad",
            ),
            ("P5324S5", "Otra razón"),
        ],
    ));

    // Importance of each election type, asked in the 2019 wave only.
    let importance: [(&str, &str, &str); 9] = [
        ("P5321S1", "importancia_jac", "Importancia: Juntas de Acción Comunal"),
        ("P5321S2", "importancia_gobernacion", "Importancia: Gobernación"),
        ("P5321S3", "importancia_concejo_municipal", "Importancia: Concejo Municipal/Distrital"),
        ("P5321S4", "importancia_alcaldia_municipal", "Importancia: Alcaldía Municipal"),
        ("P5321S5", "importancia_asamblea_departamental", "Importancia: Asamblea Departamental"),
        ("P5321S6", "importancia_concejo_bogota", "Importancia: Concejo de Bogotá"),
        ("P5321S7", "importancia_alcaldia_bogota", "Importancia: Alcaldía de Bogotá"),
        ("P5321S8", "importancia_concejo_distrital", "Importancia: Concejo Distrital"),
        ("P5321S9", "importancia_asamblea_distrital", "Importancia: Asamblea Distrital"),
    ];
    for (column, key, label) in importance {
        questions.push(QuestionConfig {
            key: key.to_string(),
            label: label.to_string(),
            kind: QuestionKind::Scale { min: 1, max: 5 },
            categories: vec![],
            waves: BTreeMap::from([(2019, column_of(column))]),
        });
    }

    questions.push(QuestionConfig {
        key: "ideologia_escala".to_string(),
        label: "Ubicación ideológica (1 = izquierda, 10 = derecha)".to_string(),
        kind: QuestionKind::Scale { min: 1, max: 10 },
        categories: vec![],
        waves: both_waves(column_of("P5328")),
    });

    questions.push(QuestionConfig {
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
        waves: both_waves(column_of("P5328")),
    });

    CatalogConfig { questions }
}
