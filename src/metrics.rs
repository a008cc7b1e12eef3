/// HP at which the record bar is full.
pub const HP_BAR_MAX: f64 = 200.0;

/// Fraction of the HP bar to fill, clamped to `[0, 1]`.
pub fn hp_fraction(hp: u32) -> f64 {
    (hp as f64 / HP_BAR_MAX).min(1.0)
}

/// Share of the total for each value, in percent. Display-only; chart specs keep
/// raw values. Returns `None` when the total is not positive.
pub fn percent_shares(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| v / total * 100.0).collect())
}

/// Largest value, if any.
pub fn max_value(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}
