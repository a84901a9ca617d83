//! Fake-discount detection and trend classification
//!
//! The classifier works on a single 90-day snapshot of observations,
//! sliced in memory into 30/60/90-day windows. Reading once keeps the
//! three windows coherent: an observation appended mid-run is either in
//! every window it belongs to or in none of them.

use super::stats::{self, WindowStats};
use super::types::{DiscountVerdict, PriceObservation, PriceTrend};
use crate::analytics_core::reader::SECS_PER_DAY;
use chrono::NaiveDate;

/// Tunable policy knobs for discount and trend classification.
///
/// The defaults are policy, not invariants: an actual discount below half
/// the claimed one is "materially overstated", a mean shift beyond 2% is
/// a directional trend, and a 30-day spread above 25% of the mean is
/// volatile.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierPolicy {
    /// Minimum actual/claimed ratio below which a claim is overstated
    pub overstatement_ratio: f64,
    /// Mean shift (percent) separating increasing/decreasing from stable
    pub trend_threshold_pct: f64,
    /// 30-day (max-min)/mean spread (percent) above which prices are volatile
    pub volatility_threshold_pct: f64,
}

impl ClassifierPolicy {
    pub fn new(
        overstatement_ratio: f64,
        trend_threshold_pct: f64,
        volatility_threshold_pct: f64,
    ) -> Self {
        Self {
            overstatement_ratio,
            trend_threshold_pct,
            volatility_threshold_pct,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(0.5, 2.0, 25.0)
    }
}

pub struct DiscountClassifier {
    policy: ClassifierPolicy,
}

impl DiscountClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn with_defaults() -> Self {
        Self::new(ClassifierPolicy::with_defaults())
    }

    /// Produce a verdict for one listing from its 90-day observation window.
    ///
    /// `window_90d` must cover `[reference - 90 days, reference]`; the 30
    /// and 60-day windows are derived from it. The current observation is
    /// excluded from the windows: the claim is judged against the history
    /// before it, otherwise the floor could never sit below the current
    /// price. Missing data never fails classification, it only degrades
    /// the verdict (None statistics, unknown trend).
    pub fn classify(
        &self,
        listing_id: i64,
        analysis_date: NaiveDate,
        current: &PriceObservation,
        window_90d: &[PriceObservation],
        reference: i64,
    ) -> DiscountVerdict {
        let cutoff_30 = reference - 30 * SECS_PER_DAY;
        let cutoff_60 = reference - 60 * SECS_PER_DAY;

        // History = everything strictly before the current observation in
        // the (observed_at, id) ordering
        let history: Vec<&PriceObservation> = window_90d
            .iter()
            .filter(|o| (o.observed_at, o.id) < (current.observed_at, current.id))
            .collect();

        let prices_90: Vec<f64> = history.iter().map(|o| o.price).collect();
        let prices_60: Vec<f64> = history
            .iter()
            .filter(|o| o.observed_at >= cutoff_60)
            .map(|o| o.price)
            .collect();
        let prices_30: Vec<f64> = history
            .iter()
            .filter(|o| o.observed_at >= cutoff_30)
            .map(|o| o.price)
            .collect();

        let stats_30d = stats::compute(&prices_30);
        let stats_60d = stats::compute(&prices_60);
        let stats_90d = stats::compute(&prices_90);

        let current_price = current.price;
        let claimed_discount_pct = claimed_discount(current_price, current.original_price);

        let floor_30d = stats_30d.map(|s| s.min);
        let actual_discount_pct = floor_30d
            .filter(|floor| *floor > 0.0)
            .map(|floor| (floor - current_price) / floor * 100.0);

        let (is_fake, fake_reason) = self.judge_claim(
            current_price,
            claimed_discount_pct,
            actual_discount_pct,
            floor_30d,
        );

        let trend = self.classify_trend(stats_30d, stats_60d, stats_90d);

        DiscountVerdict {
            listing_id,
            analysis_date,
            stats_30d,
            stats_60d,
            stats_90d,
            current_price,
            claimed_discount_pct,
            actual_discount_pct,
            is_fake,
            fake_reason,
            trend,
        }
    }

    /// Apply the fake-discount rule. Absence of a claim is never fake.
    fn judge_claim(
        &self,
        current_price: f64,
        claimed_pct: Option<f64>,
        actual_pct: Option<f64>,
        floor_30d: Option<f64>,
    ) -> (bool, Option<String>) {
        let claimed = match claimed_pct {
            Some(c) => c,
            None => return (false, None),
        };

        // Condition (a): the "discount" price never went below the recent
        // floor, so the claimed original was not a real historical price.
        if let Some(floor) = floor_30d {
            if current_price >= floor {
                return (
                    true,
                    Some(format!(
                        "current price ({:.2}) is not below the 30-day minimum ({:.2})",
                        current_price, floor
                    )),
                );
            }
        }

        // Condition (b): the claim materially overstates the real discount.
        match actual_pct {
            None => (
                true,
                Some(format!(
                    "claimed discount ({:.1}%) has no 30-day price history to support it",
                    claimed
                )),
            ),
            Some(actual) if actual < self.policy.overstatement_ratio * claimed => (
                true,
                Some(format!(
                    "actual discount ({:.1}%) is far below claimed ({:.1}%)",
                    actual, claimed
                )),
            ),
            Some(_) => (false, None),
        }
    }

    /// Classify the trend from whichever windows have data.
    ///
    /// Volatility takes precedence over a mild directional signal; with
    /// fewer than two populated windows the trend is unknown.
    fn classify_trend(
        &self,
        stats_30d: Option<WindowStats>,
        stats_60d: Option<WindowStats>,
        stats_90d: Option<WindowStats>,
    ) -> PriceTrend {
        if let Some(s30) = stats_30d {
            if s30.mean > 0.0 && (s30.max - s30.min) / s30.mean * 100.0 > self.policy.volatility_threshold_pct {
                return PriceTrend::Volatile;
            }
        }

        // Windows are nested, so any 30-day data implies 90-day data; the
        // only degraded shape is an empty 30-day window with older history
        let pair = match (stats_30d, stats_60d, stats_90d) {
            (Some(recent), _, Some(older)) => Some((recent, older)),
            (None, Some(recent), Some(older)) => Some((recent, older)),
            _ => None,
        };

        let (recent, older) = match pair {
            Some(p) => p,
            None => return PriceTrend::Unknown,
        };
        if older.mean <= 0.0 {
            return PriceTrend::Unknown;
        }

        let shift_pct = (recent.mean - older.mean) / older.mean * 100.0;
        if shift_pct > self.policy.trend_threshold_pct {
            PriceTrend::Increasing
        } else if shift_pct < -self.policy.trend_threshold_pct {
            PriceTrend::Decreasing
        } else {
            PriceTrend::Stable
        }
    }
}

/// Claimed discount percentage, present only when the claimed original
/// price exceeds the current price
fn claimed_discount(current_price: f64, original_price: Option<f64>) -> Option<f64> {
    original_price
        .filter(|orig| *orig > current_price && *orig > 0.0)
        .map(|orig| (orig - current_price) / orig * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: i64 = 1_700_000_000;

    fn obs(listing_id: i64, price: f64, original: Option<f64>, days_ago: i64) -> PriceObservation {
        PriceObservation {
            id: 0,
            listing_id,
            price,
            original_price: original,
            is_in_stock: true,
            observed_at: REF - days_ago * SECS_PER_DAY,
        }
    }

    fn window(prices: &[(f64, i64)]) -> Vec<PriceObservation> {
        prices
            .iter()
            .map(|(p, days_ago)| obs(100, *p, None, *days_ago))
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
    }

    #[test]
    fn test_fake_when_current_not_below_floor() {
        // 30-day prices [80, 85, 90, 78], floor 78, current 82, claimed 100
        let history = window(&[(80.0, 20), (85.0, 15), (90.0, 10), (78.0, 5)]);
        let current = obs(100, 82.0, Some(100.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(verdict.is_fake);
        assert!(verdict
            .fake_reason
            .as_ref()
            .unwrap()
            .contains("not below the 30-day minimum"));
        assert_eq!(verdict.stats_30d.unwrap().min, 78.0);
        // Actual discount is negative: current sits above the floor
        assert!(verdict.actual_discount_pct.unwrap() < 0.0);
        assert!((verdict.claimed_discount_pct.unwrap() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_fake_when_claim_materially_overstated() {
        // Floor 78, current 70: actual 10.3%, claimed 30% -> 10.3 < 15
        let history = window(&[(80.0, 20), (85.0, 15), (90.0, 10), (78.0, 5)]);
        let current = obs(100, 70.0, Some(100.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(verdict.is_fake);
        assert!(verdict.fake_reason.as_ref().unwrap().contains("far below claimed"));
        let actual = verdict.actual_discount_pct.unwrap();
        assert!((actual - 10.256410256410257).abs() < 1e-9);
    }

    #[test]
    fn test_legitimate_discount_not_flagged() {
        // Floor 78, current 70, claimed original 75 -> claimed 6.7%, actual 10.3%
        let history = window(&[(80.0, 20), (85.0, 15), (90.0, 10), (78.0, 5)]);
        let current = obs(100, 70.0, Some(75.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(!verdict.is_fake);
        assert!(verdict.fake_reason.is_none());
    }

    #[test]
    fn test_no_claim_is_never_fake() {
        let history = window(&[(90.0, 10), (78.0, 5)]);
        let current = obs(100, 95.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(!verdict.is_fake);
        assert!(verdict.fake_reason.is_none());
        assert!(verdict.claimed_discount_pct.is_none());
    }

    #[test]
    fn test_claim_without_history_is_fake() {
        let current = obs(100, 50.0, Some(100.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &[], REF);

        assert!(verdict.is_fake);
        assert!(verdict.fake_reason.as_ref().unwrap().contains("no 30-day price history"));
        assert!(verdict.stats_30d.is_none());
        assert!(verdict.actual_discount_pct.is_none());
        assert_eq!(verdict.trend, PriceTrend::Unknown);
    }

    #[test]
    fn test_original_price_below_current_is_no_claim() {
        let history = window(&[(90.0, 10), (78.0, 5)]);
        let current = obs(100, 95.0, Some(80.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(verdict.claimed_discount_pct.is_none());
        assert!(!verdict.is_fake);
    }

    #[test]
    fn test_windows_are_sliced_from_one_snapshot() {
        // One observation per window band
        let history = window(&[(100.0, 80), (90.0, 45), (80.0, 10)]);
        let current = obs(100, 80.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert_eq!(verdict.stats_30d.unwrap().mean, 80.0);
        assert!((verdict.stats_60d.unwrap().mean - 85.0).abs() < 1e-9);
        assert!((verdict.stats_90d.unwrap().mean - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_increasing() {
        // 30d mean 110 vs 90d mean 100: +10% > 2%
        let history = window(&[(100.0, 80), (100.0, 70), (100.0, 50), (110.0, 10), (110.0, 5)]);
        let current = obs(100, 110.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);
        assert_eq!(verdict.trend, PriceTrend::Increasing);
    }

    #[test]
    fn test_trend_decreasing() {
        let history = window(&[(100.0, 80), (100.0, 70), (100.0, 50), (90.0, 10), (90.0, 5)]);
        let current = obs(100, 90.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);
        assert_eq!(verdict.trend, PriceTrend::Decreasing);
    }

    #[test]
    fn test_trend_stable_within_threshold() {
        let history = window(&[(100.0, 80), (100.0, 50), (101.0, 10), (101.0, 5)]);
        let current = obs(100, 101.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);
        assert_eq!(verdict.trend, PriceTrend::Stable);
    }

    #[test]
    fn test_volatility_takes_precedence() {
        // 30d spread (120-80)/100 = 40% > 25%, even though means barely move
        let history = window(&[(100.0, 80), (100.0, 50), (80.0, 10), (120.0, 5)]);
        let current = obs(100, 100.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);
        assert_eq!(verdict.trend, PriceTrend::Volatile);
    }

    #[test]
    fn test_recent_only_history_degrades_to_stable() {
        // Windows are nested, so 30-day-only data fills all three with the
        // same values: zero mean shift, stable.
        let history = window(&[(100.0, 10), (102.0, 5)]);
        let current = obs(100, 102.0, None, 0);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);
        assert_eq!(verdict.trend, PriceTrend::Stable);
        assert_eq!(verdict.stats_30d, verdict.stats_90d);
    }

    #[test]
    fn test_trend_degrades_to_60_vs_90_when_recent_window_empty() {
        // All history is 35-80 days old: empty 30-day window, 60-day mean
        // 90 vs 90-day mean 95 -> -5.3% shift, decreasing
        let history = window(&[(100.0, 80), (100.0, 70), (90.0, 50), (90.0, 40)]);
        let current = obs(100, 90.0, None, 35);

        let classifier = DiscountClassifier::with_defaults();
        let verdict = classifier.classify(100, date(), &current, &history, REF);

        assert!(verdict.stats_30d.is_none());
        assert_eq!(verdict.trend, PriceTrend::Decreasing);
    }

    #[test]
    fn test_idempotent_for_same_input() {
        let history = window(&[(80.0, 20), (85.0, 15), (90.0, 10), (78.0, 5)]);
        let current = obs(100, 82.0, Some(100.0), 0);

        let classifier = DiscountClassifier::with_defaults();
        let first = classifier.classify(100, date(), &current, &history, REF);
        let second = classifier.classify(100, date(), &current, &history, REF);

        assert_eq!(first.is_fake, second.is_fake);
        assert_eq!(first.fake_reason, second.fake_reason);
        assert_eq!(first.trend, second.trend);
        assert_eq!(first.actual_discount_pct, second.actual_discount_pct);
    }
}
