use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use serde::Deserialize;

use ecp_compare::data::loader::json_cell;
use ecp_compare::{
    CatalogConfig, CompareEngine, FilterSpec, SurveyWave, WaveSchema, builtin_catalog,
    builtin_schema, load_wave,
};

/// Export the full 2019-vs-2023 survey comparison as JSON for the chart
/// layer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Export configuration: wave paths and years, optional schemas and
    /// catalog path.
    #[arg(short, long)]
    config: PathBuf,

    /// Demographic filter, a JSON object of attribute → allowed values.
    #[arg(short, long)]
    filter: Option<PathBuf>,

    /// Output path; stdout when omitted.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ExportConfig {
    before: WaveSource,
    after: WaveSource,
    /// Path to a catalog configuration; the builtin ECP catalog when
    /// omitted.
    catalog: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct WaveSource {
    path: PathBuf,
    year: u16,
    /// Overrides the builtin ECP wave schema.
    schema: Option<WaveSchema>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let text = fs::read_to_string(&args.config)
        .with_context(|| format!("reading export config {}", args.config.display()))?;
    let config: ExportConfig = serde_json::from_str(&text).context("parsing export config")?;

    let catalog = match &config.catalog {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            CatalogConfig::from_json_str(&text).context("parsing catalog config")?
        }
        None => builtin_catalog(),
    };

    let before = load_source(&config.before)?;
    let after = load_source(&config.after)?;
    let engine = CompareEngine::new(Arc::new(before), Arc::new(after), &catalog)?;

    let filter = match &args.filter {
        Some(path) => read_filter(path)?,
        None => FilterSpec::new(),
    };

    let summary = engine.summary(&filter)?;
    let json = serde_json::to_string_pretty(&summary).context("serializing summary")?;
    match &args.out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("writing summary to {}", path.display()))?;
            info!("wrote summary to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load_source(source: &WaveSource) -> Result<SurveyWave> {
    let schema = match &source.schema {
        Some(schema) => {
            if schema.year != source.year {
                bail!(
                    "schema year {} does not match declared wave year {}",
                    schema.year,
                    source.year
                );
            }
            schema.clone()
        }
        None => builtin_schema(source.year),
    };
    load_wave(&source.path, &schema)
}

fn read_filter(path: &Path) -> Result<FilterSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading filter {}", path.display()))?;
    let root: serde_json::Value = serde_json::from_str(&text).context("parsing filter")?;
    let obj = root
        .as_object()
        .context("filter must be a JSON object of attribute → allowed values")?;

    let mut spec = FilterSpec::new();
    for (attribute, values) in obj {
        let arr = values
            .as_array()
            .with_context(|| format!("filter attribute '{attribute}' must list allowed values"))?;
        let allowed: BTreeSet<_> = arr.iter().map(json_cell).collect();
        spec.insert(attribute.clone(), allowed);
    }
    Ok(spec)
}
