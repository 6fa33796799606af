//! Relative volume (RVOL) over the closed-bar volume history.

/// RVOL of the latest closed bar: its volume divided by the mean of the
/// `period` volumes preceding it. Needs `period + 1` history entries so
/// the current bar never dilutes its own baseline.
pub fn calculate_rvol(volume_history: &[f64], period: usize) -> Option<f64> {
    if period == 0 || volume_history.len() < period + 1 {
        return None;
    }

    let current = *volume_history.last().expect("history non-empty");
    let baseline = &volume_history[volume_history.len() - 1 - period..volume_history.len() - 1];
    let mean = baseline.iter().sum::<f64>() / period as f64;

    if mean <= 0.0 {
        return None;
    }

    Some(current / mean)
}
