//! Normalization of engine progress into a percentage in [0, 100]

use regex::Regex;
use std::sync::LazyLock;

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("percent pattern is valid"));

/// First `N%` / `N.N%` token in a textual progress line
pub fn parse_percent(line: &str) -> Option<f64> {
    let captures = PERCENT.captures(line)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

/// `downloaded / total * 100`, only when a non-zero total is known
pub fn from_bytes(downloaded: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|&total| total > 0)?;
    Some((downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}
