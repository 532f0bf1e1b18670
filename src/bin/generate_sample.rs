use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Draw a code from a weighted mix.
    fn pick(&mut self, mix: &[(i64, f64)]) -> i64 {
        let total: f64 = mix.iter().map(|(_, w)| w).sum();
        let mut roll = self.next_f64() * total;
        for &(code, w) in mix {
            if roll < w {
                return code;
            }
            roll -= w;
        }
        mix.last().expect("empty mix").0
    }

    /// `Some(1)` with probability `p`, null otherwise (multi-response
    /// indicator cell).
    fn indicator(&mut self, p: f64) -> Option<i64> {
        (self.next_f64() < p).then_some(1)
    }
}

enum ColumnData {
    Str(Vec<String>),
    F64(Vec<f64>),
    I64(Vec<Option<i64>>),
}

fn generate_wave(year: u16, seed: u64, rows: usize) -> Vec<(String, ColumnData)> {
    let mut rng = SimpleRng::new(seed);
    let is_2019 = year == 2019;

    let departments = ["05", "08", "11", "25", "76"];

    // Year-shifted answer mixes: turnout and ideology drift between waves.
    let participation_mix: &[(i64, f64)] = if is_2019 {
        &[(1, 0.55), (2, 0.40), (99, 0.05)]
    } else {
        &[(1, 0.62), (2, 0.33), (99, 0.05)]
    };
    let party_mix: &[(i64, f64)] = if is_2019 {
        &[(1, 0.26), (2, 0.69), (99, 0.05)]
    } else {
        &[(1, 0.19), (2, 0.76), (99, 0.05)]
    };
    let ideology_mix: &[(i64, f64)] = if is_2019 {
        &[
            (1, 0.06), (2, 0.07), (3, 0.10), (4, 0.12), (5, 0.22),
            (6, 0.16), (7, 0.10), (8, 0.08), (9, 0.05), (10, 0.04),
        ]
    } else {
        &[
            (1, 0.09), (2, 0.09), (3, 0.12), (4, 0.12), (5, 0.18),
            (6, 0.13), (7, 0.10), (8, 0.08), (9, 0.05), (10, 0.04),
        ]
    };

    let indicator_columns: &[(&str, f64)] = &[
        ("P5336S1", 0.04),
        ("P5336S2", 0.05),
        ("P5336S6", 0.18),
        ("P5336S7", 0.14),
        ("P5336S8", 0.16),
        ("P5336S10", 0.10),
        ("P5336S11", 0.20),
        ("P5336S12", 0.06),
        ("P5336S13", 0.05),
        ("P5336S14", 0.04),
        ("P5336S15", 0.05),
        ("P5336S17", 0.04),
        ("P5336S19", 0.07),
        ("P5337S1", 0.30),
        ("P5337S2", 0.25),
        ("P5337S3", 0.15),
        ("P5337S4", 0.35),
        ("P5337S5", 0.10),
        ("P5338S1", 0.08),
        ("P5338S2", 0.22),
        ("P5338S3", 0.05),
        ("P5338S4", 0.06),
        ("P5338S5", 0.04),
        ("P5339S1", 0.28),
        ("P5339S2", 0.24),
        ("P5339S3", 0.20),
        ("P5324S2", 0.30),
        ("P5324S3", 0.22),
        ("P5324S4", 0.12),
        ("P5324S5", 0.05),
        ("P5324S6", 0.25),
        ("P5324S7", 0.28),
        ("P5324S8", 0.15),
    ];

    let mut ids = Vec::with_capacity(rows);
    let mut weights = Vec::with_capacity(rows);
    let mut dpto = Vec::with_capacity(rows);
    let mut area = Vec::with_capacity(rows);
    let mut sex = Vec::with_capacity(rows);
    let mut participation = Vec::with_capacity(rows);
    let mut party = Vec::with_capacity(rows);
    let mut ideology = Vec::with_capacity(rows);

    for i in 0..rows {
        ids.push(format!("{year}-{i:05}"));
        weights.push(rng.gauss(1.0, 0.2).abs() + 0.1);
        dpto.push(departments[(rng.next_u64() % departments.len() as u64) as usize].to_string());
        area.push(Some(rng.pick(&[(1, 0.75), (2, 0.25)])));
        sex.push(Some(rng.pick(&[(1, 0.52), (2, 0.48)])));
        participation.push(Some(rng.pick(participation_mix)));
        party.push(Some(rng.pick(party_mix)));
        // Ideology: ~8% refuse (null) and ~3% coded 99.
        ideology.push(if rng.next_f64() < 0.08 {
            None
        } else if rng.next_f64() < 0.03 {
            Some(99)
        } else {
            Some(rng.pick(ideology_mix))
        });
    }

    let mut columns: Vec<(String, ColumnData)> = vec![
        ("DIRECTORIO".to_string(), ColumnData::Str(ids)),
        ("WEIGHT".to_string(), ColumnData::F64(weights)),
        ("DPTO".to_string(), ColumnData::Str(dpto)),
        ("AREA".to_string(), ColumnData::I64(area)),
        ("P220".to_string(), ColumnData::I64(sex)),
        ("P6933".to_string(), ColumnData::I64(participation)),
        ("P5323".to_string(), ColumnData::I64(party)),
        ("P5328".to_string(), ColumnData::I64(ideology)),
    ];

    for &(name, p) in indicator_columns {
        let cells = (0..rows).map(|_| rng.indicator(p)).collect();
        columns.push((name.to_string(), ColumnData::I64(cells)));
    }

    // Election-importance scales were asked in the 2019 wave only.
    if is_2019 {
        for s in 1..=9 {
            let cells = (0..rows)
                .map(|_| {
                    (rng.next_f64() >= 0.05).then(|| {
                        rng.pick(&[(1, 0.06), (2, 0.10), (3, 0.22), (4, 0.30), (5, 0.32)])
                    })
                })
                .collect();
            columns.push((format!("P5321S{s}"), ColumnData::I64(cells)));
        }
    }

    columns
}

fn write_parquet(path: &str, columns: Vec<(String, ColumnData)>) {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for (name, data) in columns {
        match data {
            ColumnData::Str(values) => {
                fields.push(Field::new(&name, DataType::Utf8, false));
                arrays.push(Arc::new(StringArray::from(
                    values.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                )));
            }
            ColumnData::F64(values) => {
                fields.push(Field::new(&name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(values)));
            }
            ColumnData::I64(values) => {
                fields.push(Field::new(&name, DataType::Int64, true));
                arrays.push(Arc::new(Int64Array::from(values)));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).expect("Failed to create RecordBatch");

    let file = std::fs::File::create(path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");
}

fn main() {
    for (year, seed, rows, path) in [
        (2019_u16, 42, 1200, "ecp_2019.parquet"),
        (2023, 43, 1500, "ecp_2023.parquet"),
    ] {
        let columns = generate_wave(year, seed, rows);
        let n_cols = columns.len();
        write_parquet(path, columns);
        println!("Wrote {rows} respondents ({n_cols} columns) to {path}");
    }
}
