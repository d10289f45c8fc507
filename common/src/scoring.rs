use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `min_count` or more observations map to `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountTier {
    pub min_count: usize,
    pub score: f64,
}

/// Values strictly above `above` map to `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueTier {
    pub above: f64,
    pub score: f64,
}

const fn count_tier(min_count: usize, score: f64) -> CountTier {
    CountTier { min_count, score }
}

/// Picks the highest score among the tiers reached by `count`.
pub fn count_tier_score(tiers: &[CountTier], count: usize) -> Option<&CountTier> {
    tiers
        .iter()
        .filter(|tier| count >= tier.min_count)
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Picks the highest score among the tiers exceeded by `value`.
pub fn value_tier_score(tiers: &[ValueTier], value: f64) -> Option<&ValueTier> {
    tiers
        .iter()
        .filter(|tier| value > tier.above)
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorWeights {
    pub velocity: f64,
    pub geographic: f64,
    pub card_testing: f64,
    pub amount: f64,
    pub collusion: f64,
    pub account_takeover: f64,
    pub fraud_ring: f64,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        Self {
            velocity: 0.25,
            geographic: 0.25,
            card_testing: 0.20,
            amount: 0.15,
            collusion: 0.05,
            account_takeover: 0.05,
            fraud_ring: 0.05,
        }
    }
}

impl IndicatorWeights {
    pub fn sum(&self) -> f64 {
        self.velocity
            + self.geographic
            + self.card_testing
            + self.amount
            + self.collusion
            + self.account_takeover
            + self.fraud_ring
    }

    fn all(&self) -> [f64; 7] {
        [
            self.velocity,
            self.geographic,
            self.card_testing,
            self.amount,
            self.collusion,
            self.account_takeover,
            self.fraud_ring,
        ]
    }
}

/// Scores below `medium` are low risk, below `high` medium risk, the rest high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: i32,
    pub high: i32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 30,
            high: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridWeights {
    pub rule_weight: f64,
    pub model_weight: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            rule_weight: 0.4,
            model_weight: 0.6,
        }
    }
}

/// Floors applied to the weighted rule score when single indicators or
/// several indicators at once fire strongly. Off unless configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Strongest indicator score at or above `min_count` lifts the rule score to `score`.
    pub strongest_indicator: Vec<CountTier>,
    pub strong_indicator_score: f64,
    /// Number of indicators at or above `strong_indicator_score`.
    pub strong_indicator_count: Vec<CountTier>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            strongest_indicator: vec![count_tier(90, 80.0), count_tier(70, 65.0)],
            strong_indicator_score: 20.0,
            strong_indicator_count: vec![count_tier(3, 70.0), count_tier(2, 55.0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    pub one_hour_tiers: Vec<CountTier>,
    pub two_hour_tier: CountTier,
    pub day_tier: CountTier,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            one_hour_tiers: vec![
                count_tier(10, 100.0),
                count_tier(8, 80.0),
                count_tier(6, 50.0),
                count_tier(3, 20.0),
            ],
            two_hour_tier: count_tier(10, 90.0),
            day_tier: count_tier(15, 60.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographicConfig {
    /// How many of the user's previous transactions are compared, newest first.
    pub lookback: usize,
    pub window_hours: i64,
    pub impossible_speed_kmh: f64,
    pub suspicious_speed_kmh: f64,
    pub min_distance_km: f64,
    pub impossible_score: f64,
    pub suspicious_score: f64,
    pub country_change_hours: f64,
    pub country_change_score: f64,
}

impl Default for GeographicConfig {
    fn default() -> Self {
        Self {
            lookback: 1,
            window_hours: 24,
            impossible_speed_kmh: 900.0,
            suspicious_speed_kmh: 500.0,
            min_distance_km: 100.0,
            impossible_score: 100.0,
            suspicious_score: 70.0,
            country_change_hours: 3.0,
            country_change_score: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardTestingConfig {
    pub window_hours: i64,
    /// Per-currency probe cutoff; amounts strictly below it count as probes.
    pub small_thresholds: BTreeMap<String, f64>,
    pub default_small_threshold: f64,
    pub min_probes: usize,
    pub confirmed_multiplier: f64,
    pub confirmed_score: f64,
    pub likely_multiplier: f64,
    pub likely_score: f64,
    pub probing_score: f64,
    pub possible_min_probes: usize,
    /// Multiple of the small threshold the current charge must exceed.
    pub possible_multiplier: f64,
    pub possible_score: f64,
}

impl CardTestingConfig {
    pub fn small_threshold(&self, currency: &str) -> f64 {
        self.small_thresholds
            .get(currency)
            .copied()
            .unwrap_or(self.default_small_threshold)
    }
}

impl Default for CardTestingConfig {
    fn default() -> Self {
        let small_thresholds = [("NGN", 300.0), ("KES", 150.0), ("ZAR", 30.0), ("USD", 10.0)]
            .into_iter()
            .map(|(currency, threshold)| (currency.to_string(), threshold))
            .collect();
        Self {
            window_hours: 24,
            small_thresholds,
            default_small_threshold: 300.0,
            min_probes: 3,
            confirmed_multiplier: 10.0,
            confirmed_score: 95.0,
            likely_multiplier: 5.0,
            likely_score: 70.0,
            probing_score: 50.0,
            possible_min_probes: 2,
            possible_multiplier: 10.0,
            possible_score: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountConfig {
    pub window_hours: i64,
    pub min_history: usize,
    /// Applied to |z|.
    pub z_tiers: Vec<ValueTier>,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            window_hours: 30 * 24,
            min_history: 5,
            z_tiers: vec![
                ValueTier {
                    above: 3.0,
                    score: 80.0,
                },
                ValueTier {
                    above: 2.0,
                    score: 50.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollusionConfig {
    pub window_days: i64,
    pub ride_tiers: Vec<CountTier>,
    pub circular_radius_km: f64,
    pub circular_min_rides: usize,
    pub circular_bonus: f64,
    pub current_circular_min_rides: usize,
    pub current_circular_bonus: f64,
}

impl Default for CollusionConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            ride_tiers: vec![count_tier(8, 80.0), count_tier(5, 40.0)],
            circular_radius_km: 0.5,
            circular_min_rides: 3,
            circular_bonus: 20.0,
            current_circular_min_rides: 3,
            current_circular_bonus: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountTakeoverConfig {
    pub history_days: i64,
    pub rapid_change_minutes: i64,
    pub new_card_new_country_rapid_score: f64,
    pub new_card_new_country_score: f64,
    pub new_card_new_device_score: f64,
    pub new_card_new_city_score: f64,
    pub new_card_score: f64,
    pub new_device_new_country_score: f64,
}

impl Default for AccountTakeoverConfig {
    fn default() -> Self {
        Self {
            history_days: 30,
            rapid_change_minutes: 30,
            new_card_new_country_rapid_score: 90.0,
            new_card_new_country_score: 70.0,
            new_card_new_device_score: 70.0,
            new_card_new_city_score: 65.0,
            new_card_score: 30.0,
            new_device_new_country_score: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudRingConfig {
    pub window_days: i64,
    pub user_tiers: Vec<CountTier>,
    pub bonus_min_users: usize,
    pub similar_amount_tolerance: f64,
    pub similar_amount_ratio: f64,
    pub similar_amount_bonus: f64,
    pub cluster_hours: f64,
    pub cluster_min_transactions: usize,
    pub cluster_bonus: f64,
}

impl Default for FraudRingConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            user_tiers: vec![count_tier(4, 90.0), count_tier(3, 70.0)],
            bonus_min_users: 3,
            similar_amount_tolerance: 0.2,
            similar_amount_ratio: 0.7,
            similar_amount_bonus: 20.0,
            cluster_hours: 24.0,
            cluster_min_transactions: 5,
            cluster_bonus: 15.0,
        }
    }
}

/// Everything the indicator engine and the scorers read. Every section falls
/// back to its defaults, so a config file only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: IndicatorWeights,
    pub risk_thresholds: RiskThresholds,
    pub hybrid: HybridWeights,
    pub escalation: Option<EscalationConfig>,
    pub velocity: VelocityConfig,
    pub geographic: GeographicConfig,
    pub card_testing: CardTestingConfig,
    pub amount: AmountConfig,
    pub collusion: CollusionConfig,
    pub account_takeover: AccountTakeoverConfig,
    pub fraud_ring: FraudRingConfig,
}

const WEIGHT_TOLERANCE: f64 = 1e-6;

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.weights.all().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("indicator weights must be non-negative: {:?}", self.weights));
        }
        if (self.weights.sum() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(format!(
                "indicator weights must sum to 1, got {}",
                self.weights.sum()
            ));
        }

        let thresholds = self.risk_thresholds;
        if !(0 <= thresholds.medium
            && thresholds.medium < thresholds.high
            && thresholds.high <= 100)
        {
            return Err(format!(
                "risk thresholds must satisfy 0 <= medium < high <= 100, got {:?}",
                thresholds
            ));
        }

        let hybrid = self.hybrid;
        if hybrid.rule_weight < 0.0
            || hybrid.model_weight < 0.0
            || (hybrid.rule_weight + hybrid.model_weight - 1.0).abs() > WEIGHT_TOLERANCE
        {
            return Err(format!(
                "hybrid weights must be non-negative and sum to 1, got {:?}",
                hybrid
            ));
        }

        if self.geographic.suspicious_speed_kmh >= self.geographic.impossible_speed_kmh {
            return Err("suspicious travel speed must be below the impossible speed".to_string());
        }
        if self.geographic.lookback == 0 {
            return Err("geographic lookback must be at least 1".to_string());
        }

        let windows = [
            ("geographic.window_hours", self.geographic.window_hours),
            ("card_testing.window_hours", self.card_testing.window_hours),
            ("amount.window_hours", self.amount.window_hours),
            ("collusion.window_days", self.collusion.window_days),
            ("account_takeover.history_days", self.account_takeover.history_days),
            ("fraud_ring.window_days", self.fraud_ring.window_days),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, value)| *value <= 0) {
            return Err(format!("{} must be positive", name));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = ScoringConfig::default();
        config.weights.velocity = 0.5;
        assert!(config.validate().unwrap_err().contains("sum to 1"));
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut config = ScoringConfig::default();
        config.risk_thresholds = RiskThresholds { medium: 60, high: 30 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn count_tiers_pick_highest_reached() {
        let tiers = VelocityConfig::default().one_hour_tiers;
        assert!(count_tier_score(&tiers, 2).is_none());
        assert_eq!(count_tier_score(&tiers, 3).map(|t| t.score), Some(20.0));
        assert_eq!(count_tier_score(&tiers, 9).map(|t| t.score), Some(80.0));
        assert_eq!(count_tier_score(&tiers, 40).map(|t| t.score), Some(100.0));
    }

    #[test]
    fn value_tiers_are_strict() {
        let tiers = AmountConfig::default().z_tiers;
        assert!(value_tier_score(&tiers, 2.0).is_none());
        assert_eq!(value_tier_score(&tiers, 2.01).map(|t| t.score), Some(50.0));
        assert_eq!(value_tier_score(&tiers, 3.5).map(|t| t.score), Some(80.0));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config: ScoringConfig =
            serde_yml::from_str("risk_thresholds:\n  high: 70\ncard_testing:\n  min_probes: 4\n")
                .unwrap();
        assert_eq!(config.risk_thresholds.medium, 30);
        assert_eq!(config.risk_thresholds.high, 70);
        assert_eq!(config.card_testing.min_probes, 4);
        assert_eq!(config.card_testing.small_threshold("KES"), 150.0);
        assert_eq!(config.card_testing.small_threshold("EUR"), 300.0);
        assert!(config.escalation.is_none());
    }
}
