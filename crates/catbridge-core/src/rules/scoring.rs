//! Ink efficiency and star rating for a won attempt.

/// Fraction of the budget left unused, clamped to `0..=1`.
pub fn efficiency(ink_used: f32, ink_budget: f32) -> f32 {
    if ink_budget <= 0.0 || !ink_budget.is_finite() {
        return 0.0;
    }
    (1.0 - ink_used / ink_budget).clamp(0.0, 1.0)
}

/// 3 stars at half the budget or better, 2 at a fifth, otherwise 1.
pub fn stars(efficiency: f32) -> u8 {
    if efficiency >= 0.5 {
        3
    } else if efficiency >= 0.2 {
        2
    } else {
        1
    }
}
