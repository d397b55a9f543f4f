use crate::config::RoundingPolicy;

/// Half-up rounding to an integer: `floor(x + 0.5)`.
/// Ties go up, so 79.5 -> 80 and -0.5 -> 0.
pub fn custom_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Half-up rounding to `places` decimals, same tie rule as `custom_round`.
pub fn round_to_places(x: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    custom_round(x * scale) / scale
}

pub fn apply_rounding(policy: RoundingPolicy, x: f64) -> f64 {
    match policy {
        RoundingPolicy::None => round_to_places(x, 2),
        RoundingPolicy::HalfUp => custom_round(x),
        // Weighted sums like 0.1*70 + 0.9*70 land a hair above the integer.
        RoundingPolicy::Ceiling => round_to_places(x, 9).ceil(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    /// Weighted sum before rounding; `None` when no category contributed.
    pub raw: Option<f64>,
    pub final_grade: Option<f64>,
    /// Parallel to the category list: score * weight where both exist.
    pub contributions: Vec<Option<f64>>,
    /// Weighted categories that had no score for this student.
    pub not_contributing: Vec<usize>,
}

/// Combine one student's category scores. `weights` is parallel to `scores`,
/// `None` meaning the category has no configured weight.
pub fn combine_weighted(
    scores: &[Option<f64>],
    weights: &[Option<f64>],
    policy: RoundingPolicy,
) -> GradeOutcome {
    let mut sum = 0.0_f64;
    let mut contributed = false;
    let mut contributions = Vec::with_capacity(scores.len());
    let mut not_contributing = Vec::new();

    for (idx, score) in scores.iter().enumerate() {
        let weight = weights.get(idx).copied().flatten();
        match (score, weight) {
            (Some(s), Some(w)) => {
                sum += s * w;
                contributed = true;
                contributions.push(Some(s * w));
            }
            (None, Some(_)) => {
                not_contributing.push(idx);
                contributions.push(None);
            }
            _ => contributions.push(None),
        }
    }

    let raw = contributed.then_some(sum);
    GradeOutcome {
        raw,
        final_grade: raw.map(|v| apply_rounding(policy, v)),
        contributions,
        not_contributing,
    }
}

pub fn weights_sum_mismatch(total: f64, tolerance: f64) -> bool {
    (total - 1.0).abs() > tolerance
}
