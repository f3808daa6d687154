/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of the positive entries and how many there were.
pub fn positive_sum_count(values: impl IntoIterator<Item = f64>) -> (f64, usize) {
    values
        .into_iter()
        .filter(|v| *v > 0.0)
        .fold((0.0, 0), |(sum, count), v| (sum + v, count + 1))
}
