use std::cmp::Ordering;

use itertools::Itertools;
use serde::Serialize;

/// Count, central tendency and spread of a set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (`n - 1` denominator); 0 for a single value.
    pub std_dev: f64,
}

/// Rounds `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// `None` for an empty set. Non-finite values must be filtered out beforehand.
pub fn describe_values(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let mean = mean(values);
    let std_dev = if count > 1 {
        let squares: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
        (squares / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(Summary {
        count,
        mean,
        median: median(values)?,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sorted(values: &[f64]) -> Vec<f64> {
    values.iter().copied().sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)).collect()
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values);
    let middle = sorted.len() / 2;

    match sorted.len() {
        0 => None,
        len if len % 2 == 0 => Some((sorted[middle - 1] + sorted[middle]) / 2.0),
        _ => Some(sorted[middle]),
    }
}

/// Pearson's linear correlation. `None` with fewer than two pairs or when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let (mean_x, mean_y) = (mean(xs), mean(ys));
    let (mut covariance, mut variance_x, mut variance_y) = (0.0, 0.0, 0.0);

    for (x, y) in xs.iter().zip(ys) {
        covariance += (x - mean_x) * (y - mean_y);
        variance_x += (x - mean_x).powi(2);
        variance_y += (y - mean_y).powi(2);
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }

    Some(covariance / (variance_x.sqrt() * variance_y.sqrt()))
}

/// Spearman's rank correlation: Pearson over ranks, ties sharing their average rank.
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }

    pearson(&ranks(xs), &ranks(ys))
}

/// 1-based ranks; tied values get the average of the ranks they span.
fn ranks(values: &[f64]) -> Vec<f64> {
    let order: Vec<usize> = (0..values.len())
        .sorted_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal))
        .collect();

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;

    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }

        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = average_rank;
        }

        start = end + 1;
    }

    ranks
}
