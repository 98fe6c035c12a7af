//! Fee-adjusted edge arithmetic.
//!
//! When a score crosses a threshold, the "Over X" market's true probability
//! is effectively 100% — the event already happened, we're racing the
//! market's reprice. Moneyline edge instead weighs a win-probability
//! estimate, since the outcome hasn't happened yet.

pub const KALSHI_FEE_RATE: f64 = 0.07;
pub const CONTRACT_PAYOUT_CENTS: i32 = 100;

fn net_payout_cents(fee_rate: f64) -> f64 {
    CONTRACT_PAYOUT_CENTS as f64 * (1.0 - fee_rate)
}

/// Edge in cents per contract, assuming ~100% win probability (the
/// threshold has already been crossed). Can be negative.
pub fn calculate_edge(yes_ask_cents: i32, fee_rate: f64) -> i32 {
    (net_payout_cents(fee_rate) - yes_ask_cents as f64) as i32
}

/// Highest YES ask (cents) at which `min_edge_cents` of edge still holds.
/// Used as the trade's limit price ceiling.
pub fn max_tradeable_price(min_edge_cents: i32, fee_rate: f64) -> i32 {
    (net_payout_cents(fee_rate) - min_edge_cents as f64) as i32
}

pub fn has_edge(yes_ask_cents: i32, min_edge_cents: i32, fee_rate: f64) -> bool {
    calculate_edge(yes_ask_cents, fee_rate) >= min_edge_cents
}

/// Edge in cents per contract for a moneyline (win-probability-weighted)
/// trade: `100 * win_prob * (1 - fee_rate) - ask`.
pub fn calculate_moneyline_edge(ask_cents: i32, win_prob: f64, fee_rate: f64) -> i32 {
    (CONTRACT_PAYOUT_CENTS as f64 * win_prob * (1.0 - fee_rate) - ask_cents as f64) as i32
}

pub fn has_moneyline_edge(
    ask_cents: i32,
    win_prob: f64,
    min_edge_cents: i32,
    fee_rate: f64,
) -> bool {
    calculate_moneyline_edge(ask_cents, win_prob, fee_rate) >= min_edge_cents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_matches_known_fee_adjusted_values() {
        // net payout = 100 * 0.93 = 93
        assert_eq!(calculate_edge(50, KALSHI_FEE_RATE), 43);
        assert_eq!(calculate_edge(90, KALSHI_FEE_RATE), 3);
        assert!(!has_edge(91, 3, KALSHI_FEE_RATE));
        assert!(has_edge(90, 3, KALSHI_FEE_RATE));
    }

    #[test]
    fn max_tradeable_price_is_net_payout_minus_min_edge() {
        assert_eq!(max_tradeable_price(3, KALSHI_FEE_RATE), 90);
    }

    #[test]
    fn moneyline_edge_scales_with_win_probability() {
        let edge = calculate_moneyline_edge(50, 0.78, KALSHI_FEE_RATE);
        // 100 * 0.78 * 0.93 = 72.54 -> 72
        assert_eq!(edge, 72);
        assert!(has_moneyline_edge(50, 0.78, 3, KALSHI_FEE_RATE));
        assert!(!has_moneyline_edge(80, 0.68, 3, KALSHI_FEE_RATE));
    }
}
