//! Expected resource yield for a run and how lucky the actual yield was.
//!
//! Each drone kill drops the resource with a fixed chance; a drop is worth
//! more when a retriever booster procs. Each rotation also pays a base reward
//! with a small chance of a bonus. The compound distribution is approximated
//! by a normal with matching mean and variance.

use serde::{Deserialize, Serialize};

/// Chance that a drone kill drops anything.
pub const DROP_CHANCE: f64 = 0.15;
/// Chance that a drop is doubled by the retriever booster.
pub const RETRIEVER_CHANCE: f64 = 0.18;

const BOOSTED_DROP: f64 = 4.0;
const PLAIN_DROP: f64 = 2.0;
const ROTATION_BONUS_CHANCE: f64 = 0.07;
const ROTATION_BONUS: f64 = 3.0;

/// A fixed point on the yield distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scenario {
    pub z: f64,
    /// Share of runs doing at least this well, e.g. `"90%"`.
    pub odds: &'static str,
    pub label: &'static str,
}

pub const SCENARIOS: [Scenario; 7] = [
    Scenario {
        z: -2.326,
        odds: "99%",
        label: "Worst Case",
    },
    Scenario {
        z: -1.282,
        odds: "90%",
        label: "Unlucky",
    },
    Scenario {
        z: -0.674,
        odds: "75%",
        label: "Below Avg",
    },
    Scenario {
        z: 0.0,
        odds: "50%",
        label: "Average",
    },
    Scenario {
        z: 0.674,
        odds: "25%",
        label: "Above Avg",
    },
    Scenario {
        z: 1.282,
        odds: "10%",
        label: "High Roll",
    },
    Scenario {
        z: 2.326,
        odds: " 1%",
        label: "God Roll",
    },
];

/// Normal approximation of a run's total yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldEstimate {
    pub mean: f64,
    pub std_dev: f64,
}

impl YieldEstimate {
    pub fn new(drone_kills: u32, rounds: u32) -> Self {
        let per_drop_mean = BOOSTED_DROP * RETRIEVER_CHANCE + PLAIN_DROP * (1.0 - RETRIEVER_CHANCE);
        let per_drop_sq = BOOSTED_DROP.powi(2) * RETRIEVER_CHANCE
            + PLAIN_DROP.powi(2) * (1.0 - RETRIEVER_CHANCE);
        let per_drop_var = per_drop_sq - per_drop_mean.powi(2);

        let r = f64::from(rounds);
        let rotation_mean = r + r * ROTATION_BONUS_CHANCE * ROTATION_BONUS;
        let rotation_var =
            r * ROTATION_BONUS_CHANCE * (1.0 - ROTATION_BONUS_CHANCE) * ROTATION_BONUS.powi(2);

        let n = f64::from(drone_kills);
        let drops_mean = n * DROP_CHANCE;
        let drops_var = n * DROP_CHANCE * (1.0 - DROP_CHANCE);
        let drone_mean = drops_mean * per_drop_mean;
        let drone_var = drops_mean * per_drop_var + per_drop_mean.powi(2) * drops_var;

        Self {
            mean: rotation_mean + drone_mean,
            std_dev: (rotation_var + drone_var).sqrt(),
        }
    }

    /// Yield at `z` standard deviations from the mean, never negative.
    pub fn at(&self, z: f64) -> f64 {
        self.std_dev.mul_add(z, self.mean).max(0.0)
    }

    /// Each fixed scenario with its rounded yield.
    pub fn scenarios(&self) -> Vec<(Scenario, u64)> {
        SCENARIOS
            .iter()
            .map(|s| (*s, round_yield(self.at(s.z))))
            .collect()
    }

    /// Fraction of runs expected to yield no more than `actual`.
    pub fn percentile(&self, actual: f64) -> f64 {
        if self.std_dev <= 0.0 {
            return match actual.partial_cmp(&self.mean) {
                Some(std::cmp::Ordering::Greater) => 1.0,
                Some(std::cmp::Ordering::Less) => 0.0,
                _ => 0.5,
            };
        }
        standard_normal_cdf((actual - self.mean) / self.std_dev)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_yield(value: f64) -> u64 {
    value.round().max(0.0) as u64
}

/// Abramowitz-Stegun approximation of the standard normal CDF.
pub fn standard_normal_cdf(z: f64) -> f64 {
    let t = 1.0 / 0.231_641_9f64.mul_add(z.abs(), 1.0);
    let d = 0.398_942_3 * (-z * z / 2.0).exp();
    let poly = t * (0.319_381_5
        + t * (-0.356_563_8 + t * (1.781_478 + t * (-1.821_256 + t * 1.330_274))));
    let p = d * poly;
    if z > 0.0 { 1.0 - p } else { p }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckTier {
    GodRoll,
    HighRoll,
    AboveAverage,
    Average,
    BelowAverage,
    Unlucky,
    WorstCase,
}

impl LuckTier {
    pub fn from_percentile(p: f64) -> Self {
        if p >= 0.99 {
            Self::GodRoll
        } else if p >= 0.90 {
            Self::HighRoll
        } else if p >= 0.75 {
            Self::AboveAverage
        } else if p > 0.25 {
            Self::Average
        } else if p > 0.10 {
            Self::BelowAverage
        } else if p > 0.01 {
            Self::Unlucky
        } else {
            Self::WorstCase
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GodRoll => "GOD ROLL",
            Self::HighRoll => "High Roll",
            Self::AboveAverage => "Above Avg",
            Self::Average => "Average",
            Self::BelowAverage => "Below Avg",
            Self::Unlucky => "Unlucky",
            Self::WorstCase => "WORST CASE",
        }
    }
}

impl std::fmt::Display for LuckTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_rotations_only() {
        let estimate = YieldEstimate::new(0, 10);
        assert!(close(estimate.mean, 12.1, 1e-9));
        assert!(close(estimate.std_dev, 5.859f64.sqrt(), 1e-9));
    }

    #[test]
    fn test_drones_only() {
        let estimate = YieldEstimate::new(1000, 0);
        // 150 drops at 2.36 each.
        assert!(close(estimate.mean, 354.0, 1e-9));
        let var = 150.0 * 0.5904 + 2.36f64.powi(2) * 127.5;
        assert!(close(estimate.std_dev, var.sqrt(), 1e-9));
    }

    #[test]
    fn test_empty_run_has_zero_spread() {
        let estimate = YieldEstimate::new(0, 0);
        assert!(estimate.mean.abs() < f64::EPSILON);
        assert!(close(estimate.percentile(0.0), 0.5, 1e-12));
        assert!(close(estimate.percentile(3.0), 1.0, 1e-12));
    }

    #[test]
    fn test_cdf_reference_points() {
        assert!(close(standard_normal_cdf(0.0), 0.5, 1e-6));
        assert!(close(standard_normal_cdf(1.282), 0.90, 1e-3));
        assert!(close(standard_normal_cdf(-1.282), 0.10, 1e-3));
        assert!(close(standard_normal_cdf(2.326), 0.99, 1e-3));
    }

    #[test]
    fn test_percentile_at_mean_is_half() {
        let estimate = YieldEstimate::new(2000, 20);
        assert!(close(estimate.percentile(estimate.mean), 0.5, 1e-6));
    }

    #[test]
    fn test_scenarios_are_ordered() {
        let estimate = YieldEstimate::new(2000, 20);
        let values: Vec<u64> = estimate.scenarios().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values.len(), 7);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_low_scenarios_clamp_at_zero() {
        let estimate = YieldEstimate {
            mean: 1.0,
            std_dev: 10.0,
        };
        assert!(estimate.at(-2.326).abs() < f64::EPSILON);
    }

    #[test]
    fn test_luck_tiers() {
        assert_eq!(LuckTier::from_percentile(0.995), LuckTier::GodRoll);
        assert_eq!(LuckTier::from_percentile(0.90), LuckTier::HighRoll);
        assert_eq!(LuckTier::from_percentile(0.80), LuckTier::AboveAverage);
        assert_eq!(LuckTier::from_percentile(0.5), LuckTier::Average);
        assert_eq!(LuckTier::from_percentile(0.25), LuckTier::BelowAverage);
        assert_eq!(LuckTier::from_percentile(0.05), LuckTier::Unlucky);
        assert_eq!(LuckTier::from_percentile(0.01), LuckTier::WorstCase);
        assert_eq!(LuckTier::GodRoll.to_string(), "GOD ROLL");
    }
}
