// =============================================================================
// Forecast Synthesizer — short-horizon projected price path
// =============================================================================
//
// Projects a forward price path from the tail of the observed series, a
// momentum estimate, and the server-supplied predicted price:
//
//   drift  = mean of the last two consecutive price deltas (0 with <3 points)
//   target = (predictedPrice ?? currentPrice) + drift * momentum_multiplier
//
// The path is a straight-line interpolation from the last observed price to
// the target over a fixed number of evenly spaced points, reaching the target
// exactly at the final point. The direction flag only selects the stroke and
// fill styling of the forecast segment on the TV chart.
// =============================================================================

use serde::Serialize;

use crate::runtime_config::ForecastParams;
use crate::types::PricePoint;

/// One projected point of the forecast path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    /// Epoch milliseconds.
    pub t: i64,
    pub value: f64,
}

/// The synthesized forecast path for one product.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    /// Price the path converges to at its final point.
    pub target: f64,
    /// True when the final forecast value is at or above the last observed
    /// price. Ties count as up.
    pub direction_up: bool,
}

/// Synthesize the forecast path for the given observed series.
///
/// `history` is the output of [`crate::history::derive_history`] (already
/// sorted, anchored). `predicted_price` is the opaque server-supplied value;
/// absent, the current price is the target base. `now_ms` is only used when
/// the observed series is empty.
pub fn derive_forecast(
    history: &[PricePoint],
    current_price: f64,
    predicted_price: Option<f64>,
    params: &ForecastParams,
    now_ms: i64,
) -> Forecast {
    let drift = momentum_drift(history);

    let target_base = predicted_price.unwrap_or(current_price);
    let target = target_base + drift * params.momentum_multiplier;

    let last_price = history.last().map_or(current_price, |p| p.price);
    let start_t = history.last().map_or(now_ms, |p| p.t);

    let steps = params.steps.max(1);
    let mut points = Vec::with_capacity(steps);
    for i in 1..=steps {
        let ratio = i as f64 / steps as f64;
        points.push(ForecastPoint {
            t: start_t + i as i64 * params.step_ms(),
            value: last_price + (target - last_price) * ratio,
        });
    }

    let final_value = points.last().map_or(last_price, |p| p.value);

    Forecast {
        points,
        target,
        direction_up: final_value >= last_price,
    }
}

/// Average of the last two consecutive price deltas, oldest of the three
/// points first. Returns 0 with fewer than 3 observed points.
fn momentum_drift(history: &[PricePoint]) -> f64 {
    if history.len() < 3 {
        return 0.0;
    }
    let p1 = history[history.len() - 1].price;
    let p2 = history[history.len() - 2].price;
    let p3 = history[history.len() - 3].price;
    ((p1 - p2) + (p2 - p3)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_714_564_800_000;
    const EPS: f64 = 1e-9;

    fn params() -> ForecastParams {
        ForecastParams::default()
    }

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                t: NOW - 60_000 * (prices.len() - i) as i64,
                price,
            })
            .collect()
    }

    #[test]
    fn emits_exactly_six_points_ending_on_target() {
        let hist = series(&[3.0, 3.2, 3.5]);
        let fc = derive_forecast(&hist, 3.5, Some(3.8), &params(), NOW);

        assert_eq!(fc.points.len(), 6);
        assert!((fc.points.last().unwrap().value - fc.target).abs() < EPS);
    }

    #[test]
    fn points_are_spaced_ten_minutes_apart() {
        let hist = series(&[3.0, 3.2, 3.5]);
        let fc = derive_forecast(&hist, 3.5, None, &params(), NOW);

        let start_t = hist.last().unwrap().t;
        for (i, p) in fc.points.iter().enumerate() {
            assert_eq!(p.t, start_t + (i as i64 + 1) * 600_000);
        }
    }

    #[test]
    fn flat_case_yields_constant_path() {
        // predictedPrice == currentPrice and <3 history points: zero drift,
        // zero delta — every forecast value equals the current price.
        let hist = series(&[2.0]);
        let fc = derive_forecast(&hist, 2.0, Some(2.0), &params(), NOW);

        assert_eq!(fc.points.len(), 6);
        for p in &fc.points {
            assert!((p.value - 2.0).abs() < EPS);
        }
        assert!(fc.direction_up, "tie counts as up");
    }

    #[test]
    fn drift_amplifies_target() {
        // Deltas: +0.2 and +0.4 -> drift 0.3; target = 3.6 + 0.3 * 1.35.
        let hist = series(&[3.0, 3.2, 3.6]);
        let fc = derive_forecast(&hist, 3.6, None, &params(), NOW);
        assert!((fc.target - (3.6 + 0.3 * 1.35)).abs() < EPS);
    }

    #[test]
    fn fewer_than_three_points_means_no_drift() {
        let hist = series(&[3.0, 9.0]);
        let fc = derive_forecast(&hist, 9.0, None, &params(), NOW);
        assert!((fc.target - 9.0).abs() < EPS);
    }

    #[test]
    fn downward_forecast_flags_down() {
        let hist = series(&[4.0, 3.5, 3.0]);
        let fc = derive_forecast(&hist, 3.0, Some(2.5), &params(), NOW);
        assert!(!fc.direction_up);
        assert!(fc.points.last().unwrap().value < 3.0);
    }

    #[test]
    fn empty_history_starts_from_now_at_current_price() {
        let fc = derive_forecast(&[], 2.0, None, &params(), NOW);
        assert_eq!(fc.points[0].t, NOW + 600_000);
        for p in &fc.points {
            assert!((p.value - 2.0).abs() < EPS);
        }
    }

    #[test]
    fn interpolation_is_linear() {
        let hist = series(&[2.0]);
        let fc = derive_forecast(&hist, 2.0, Some(3.2), &params(), NOW);

        // Step i carries lastPrice + (target - lastPrice) * i/6.
        for (i, p) in fc.points.iter().enumerate() {
            let expected = 2.0 + (3.2 - 2.0) * (i as f64 + 1.0) / 6.0;
            assert!((p.value - expected).abs() < EPS);
        }
    }
}
