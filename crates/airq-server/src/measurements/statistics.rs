//! Descriptive statistics over in-memory readings
//!
//! Matches the PostgreSQL aggregates used by the database repository:
//! `STDDEV` is the sample deviation and percentiles are continuous
//! (`PERCENTILE_CONT`, linear interpolation between neighbours).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p95: f64,
    pub count: usize,
}

/// Summarize `values`; `None` when empty
pub fn summarize(mut values: Vec<f64>) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    Some(Summary {
        average: mean,
        minimum: values[0],
        maximum: values[count - 1],
        std_dev: sample_std_dev(&values, mean),
        median: percentile_cont(&values, 0.5),
        p95: percentile_cont(&values, 0.95),
        count,
    })
}

/// Sample standard deviation; 0 for fewer than two values
pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

/// Continuous percentile of already sorted values
pub fn percentile_cont(sorted: &[f64], fraction: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = fraction.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        },
    }
}
