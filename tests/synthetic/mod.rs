//! Seeded synthetic studies with known causal structure.

use confounder::data::{Dataset, Study};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Normal, Poisson, Uniform};
use std::io::{self, Write};
use tempfile::NamedTempFile;

pub const TRUE_TUTORING_EFFECT: f64 = 5.0;

/// Age drives both tutoring uptake (younger students get more) and test
/// scores (+2 per year). Tutoring adds 5 points. School size is unrelated noise.
pub fn tutoring_columns(n: usize, seed: u64) -> Vec<(&'static str, Vec<f64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let age_dist = Uniform::new(10.0, 18.0);
    let score_noise = Normal::new(0.0, 3.0).unwrap();
    let size_dist = Normal::new(1000.0, 200.0).unwrap();

    let mut age = Vec::with_capacity(n);
    let mut tutoring = Vec::with_capacity(n);
    let mut score = Vec::with_capacity(n);
    let mut school_size = Vec::with_capacity(n);
    for _ in 0..n {
        let a: f64 = age_dist.sample(&mut rng);
        let p = 1.0 / (1.0 + (-(5.0 - 0.4 * a)).exp());
        let treated = if Bernoulli::new(p).unwrap().sample(&mut rng) {
            1.0
        } else {
            0.0
        };
        age.push(a);
        tutoring.push(treated);
        score.push(50.0 + TRUE_TUTORING_EFFECT * treated + 2.0 * a + score_noise.sample(&mut rng));
        school_size.push(size_dist.sample(&mut rng));
    }

    vec![
        ("student_age", age),
        ("school_size", school_size),
        ("received_tutoring", tutoring),
        ("test_score", score),
    ]
}

pub fn tutoring_study(n: usize, seed: u64) -> Study {
    Study::new(
        Dataset::from_columns(tutoring_columns(n, seed)).unwrap(),
        "received_tutoring",
        "test_score",
        vec!["student_age".to_string(), "school_size".to_string()],
        "Does online tutoring improve test scores?",
        None,
    )
    .unwrap()
}

/// Genetics (never recorded) drives both coffee drinking and heart rate;
/// coffee itself has no effect. Age raises heart rate only.
pub fn coffee_study(n: usize, seed: u64) -> Study {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 5.0).unwrap();

    let mut age = Vec::with_capacity(n);
    let mut coffee = Vec::with_capacity(n);
    let mut heart_rate = Vec::with_capacity(n);
    for _ in 0..n {
        let genetics: f64 = rng.sample(rand_distr::StandardNormal);
        let cups: f64 = Poisson::new(genetics.exp()).unwrap().sample(&mut rng);
        let a = rng.gen_range(20.0..60.0);
        age.push(a);
        coffee.push(if cups > 2.0 { 1.0 } else { 0.0 });
        heart_rate.push(60.0 + 15.0 * genetics + 0.5 * a + noise.sample(&mut rng));
    }

    Study::new(
        Dataset::from_columns(vec![
            ("age", age),
            ("drinks_coffee", coffee),
            ("heart_rate", heart_rate),
        ])
        .unwrap(),
        "drinks_coffee",
        "heart_rate",
        vec!["age".to_string()],
        "Does coffee raise resting heart rate?",
        None,
    )
    .unwrap()
}

/// Writes columns as a CSV file with a leading `id` column.
pub fn write_csv(columns: &[(&str, Vec<f64>)]) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    let header: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    writeln!(file, "id,{}", header.join(","))?;
    let n = columns.first().map_or(0, |(_, values)| values.len());
    for row in 0..n {
        let cells: Vec<String> = columns
            .iter()
            .map(|(_, values)| format!("{:.6}", values[row]))
            .collect();
        writeln!(file, "{},{}", row + 1, cells.join(","))?;
    }
    file.flush()?;
    Ok(file)
}
