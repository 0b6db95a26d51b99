use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// One bar of a scree plot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScreePoint {
    /// 1-based component index.
    pub component: usize,
    pub eigenvalue: f64,
    pub ratio: f64,
    pub cumulative_ratio: f64,
}

/// Builds scree data from a descending eigenvalue spectrum.
///
/// Returns an empty vector when the spectrum sums to zero.
pub fn scree_points(eigenvalues: &Array1<f64>) -> Vec<ScreePoint> {
    let total = eigenvalues.sum();
    if !(total > 0.0) {
        return Vec::new();
    }
    let mut cumulative_ratio = 0.0;
    eigenvalues
        .iter()
        .enumerate()
        .map(|(i, &eigenvalue)| {
            let ratio = eigenvalue / total;
            cumulative_ratio += ratio;
            ScreePoint { component: i + 1, eigenvalue, ratio, cumulative_ratio }
        })
        .collect()
}

/// Renders a horizontal text bar chart, one line per component.
/// The longest possible bar (ratio 1.0) is `width` characters.
pub fn render_scree(points: &[ScreePoint], width: usize) -> String {
    let mut out = format!("{:>4}  {:>12}  {:>7}  {:>7}  \n", "PC", "eigenvalue", "ratio", "cumul.");
    for p in points {
        let bar_len = (p.ratio * width as f64).round() as usize;
        out.push_str(&format!(
            "{:>4}  {:>12.6}  {:>6.2}%  {:>6.2}%  {}\n",
            p.component,
            p.eigenvalue,
            100.0 * p.ratio,
            100.0 * p.cumulative_ratio,
            "#".repeat(bar_len.min(width))
        ));
    }
    out
}
