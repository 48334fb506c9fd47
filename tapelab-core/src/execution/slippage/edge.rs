//! EDGE bid-ask spread estimator (Ardia, Guidotti & Kroencke 2024).
//!
//! Estimates the fractional effective spread from OHLC prices alone. Two
//! moment-condition estimators are formed from de-meaned log-midpoint terms
//! and the probabilities that open/close sit on the bar's extremes, then
//! combined by inverse-variance weighting. A negative squared-spread
//! estimate is floored at zero.

use crate::domain::Bar;

/// Fractional spread estimate over `bars` (oldest first), or `None` when the
/// window is too short or degenerate (no price variation, probabilities of
/// zero).
pub fn edge_spread(bars: &[Bar]) -> Option<f64> {
    let n = bars.len();
    if n < 3 {
        return None;
    }

    let o: Vec<f64> = bars.iter().map(|b| b.open.ln()).collect();
    let h: Vec<f64> = bars.iter().map(|b| b.high.ln()).collect();
    let l: Vec<f64> = bars.iter().map(|b| b.low.ln()).collect();
    let c: Vec<f64> = bars.iter().map(|b| b.close.ln()).collect();
    let m: Vec<f64> = h.iter().zip(&l).map(|(hi, lo)| (hi + lo) / 2.0).collect();

    let obs = n - 1;

    // Indicator of price variation and of the open/close lying strictly
    // inside the bar's range.
    let mut tau = vec![0.0; obs];
    let mut phi1 = vec![0.0; obs];
    let mut phi2 = vec![0.0; obs];
    let mut phi3 = vec![0.0; obs];
    let mut phi4 = vec![0.0; obs];
    for t in 0..obs {
        let i = t + 1;
        let varied = h[i] != l[i] || l[i] != c[i - 1];
        tau[t] = indicator(varied);
        phi1[t] = indicator(varied && o[i] != h[i]);
        phi2[t] = indicator(varied && o[i] != l[i]);
        phi3[t] = indicator(varied && c[i - 1] != h[i - 1]);
        phi4[t] = indicator(varied && c[i - 1] != l[i - 1]);
    }

    let pt = mean(&tau);
    let po = mean(&phi1) + mean(&phi2);
    let pc = mean(&phi3) + mean(&phi4);
    if pt == 0.0 || po == 0.0 || pc == 0.0 {
        return None;
    }

    // Log-midpoint return terms.
    let mut r1 = vec![0.0; obs]; // m_t - o_t
    let mut r2 = vec![0.0; obs]; // o_t - m_{t-1}
    let mut r3 = vec![0.0; obs]; // m_t - c_{t-1}
    let mut r4 = vec![0.0; obs]; // c_{t-1} - m_{t-1}
    let mut r5 = vec![0.0; obs]; // o_t - c_{t-1}
    for t in 0..obs {
        let i = t + 1;
        r1[t] = m[i] - o[i];
        r2[t] = o[i] - m[i - 1];
        r3[t] = m[i] - c[i - 1];
        r4[t] = c[i - 1] - m[i - 1];
        r5[t] = o[i] - c[i - 1];
    }

    let m1 = mean(&r1) / pt;
    let m3 = mean(&r3) / pt;
    let m5 = mean(&r5) / pt;

    // De-meaned moment conditions and the two spread estimators.
    let mut x1 = vec![0.0; obs];
    let mut x2 = vec![0.0; obs];
    for t in 0..obs {
        let d1 = r1[t] - tau[t] * m1;
        let d3 = r3[t] - tau[t] * m3;
        let d5 = r5[t] - tau[t] * m5;
        x1[t] = -4.0 / po * d1 * r2[t] - 4.0 / pc * d3 * r4[t];
        x2[t] = -4.0 / po * d1 * r5[t] - 4.0 / pc * d5 * r4[t];
    }

    let e1 = mean(&x1);
    let e2 = mean(&x2);
    let v1 = variance(&x1, e1);
    let v2 = variance(&x2, e2);

    // Inverse-variance weighting; equal weights when both are degenerate.
    let s2 = if v1 + v2 > 0.0 {
        (v2 * e1 + v1 * e2) / (v1 + v2)
    } else {
        (e1 + e2) / 2.0
    };

    Some(s2.max(0.0).sqrt())
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use chrono::{TimeZone, Utc};

    /// Quote-bounce series around a constant mid: trades hit bid and ask at
    /// half-spread `s/2`, so high = ask, low = bid. Two of every three bars
    /// open at the ask and close at the bid, the third is reversed, which
    /// keeps both moment-condition estimators non-degenerate.
    fn bounce_series(mid: f64, spread_frac: f64, n: usize) -> Vec<Bar> {
        let half = mid * spread_frac / 2.0;
        (0..n)
            .map(|i| {
                let ask_open = i % 3 != 0;
                let (open, close) = if ask_open {
                    (mid + half, mid - half)
                } else {
                    (mid - half, mid + half)
                };
                Bar::new(
                    "SPY",
                    Interval::Day1,
                    Utc.timestamp_opt(86_400 * (i as i64 + 1), 0).unwrap(),
                    open,
                    mid + half,
                    mid - half,
                    close,
                    1_000.0,
                )
            })
            .collect()
    }

    #[test]
    fn short_window_returns_none() {
        assert!(edge_spread(&bounce_series(100.0, 0.01, 2)).is_none());
    }

    #[test]
    fn constant_prices_estimate_zero_or_none() {
        let flat: Vec<Bar> = (0..30)
            .map(|i| {
                Bar::new(
                    "SPY",
                    Interval::Day1,
                    Utc.timestamp_opt(86_400 * (i + 1), 0).unwrap(),
                    100.0,
                    100.0,
                    100.0,
                    100.0,
                    1_000.0,
                )
            })
            .collect();
        // No price variation at all: tau = 0 everywhere.
        assert!(edge_spread(&flat).is_none());
    }

    #[test]
    fn recovers_spread_magnitude_from_quote_bounce() {
        // True spread 2%; the mixed-side construction estimates ~2.6%.
        let est = edge_spread(&bounce_series(100.0, 0.02, 60)).unwrap();
        assert!(est > 0.01, "estimate {est} should be positive and material");
        assert!(est < 0.04, "estimate {est} should be near the true 2% spread");
    }

    #[test]
    fn wider_dispersion_does_not_decrease_estimate() {
        let narrow = edge_spread(&bounce_series(100.0, 0.01, 60)).unwrap();
        let wide = edge_spread(&bounce_series(100.0, 0.04, 60)).unwrap();
        assert!(
            wide >= narrow,
            "wider quoted spread must not shrink the estimate (narrow={narrow}, wide={wide})"
        );
    }

    #[test]
    fn estimate_is_never_negative() {
        // Trending series without bounce: s² may come out negative and must
        // be floored at zero.
        let trend: Vec<Bar> = (0..40)
            .map(|i| {
                let p = 100.0 + i as f64;
                Bar::new(
                    "SPY",
                    Interval::Day1,
                    Utc.timestamp_opt(86_400 * (i + 1), 0).unwrap(),
                    p,
                    p + 0.5,
                    p - 0.5,
                    p + 0.25,
                    1_000.0,
                )
            })
            .collect();
        if let Some(est) = edge_spread(&trend) {
            assert!(est >= 0.0);
        }
    }
}
