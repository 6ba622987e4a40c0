//! Well-known dashboard topics.
//!
//! | Topic | Payload |
//! |-------|---------|
//! | [`TRADING_SIGNALS`] | `[TradingSignal]` |
//! | [`EVENTS`] | `[DashboardEvent]` |
//! | [`SIGNAL_ACTIONS`] | `[DashboardEvent]` |
//! | [`CURRENT_TRADES`] | `[CurrentTrade]` |
//! | [`DEALING_RANGE`] | `[DashboardEvent]` |
//! | [`V2_EVENTS`] | `[DashboardEvent]` |

/// Trading signals feed.
pub const TRADING_SIGNALS: &str = "/topic/trading-signals";

/// Indicator events across all symbols.
pub const EVENTS: &str = "/topic/events";

/// Signal action events.
pub const SIGNAL_ACTIONS: &str = "/topic/signal-actions";

/// Open trades per account.
pub const CURRENT_TRADES: &str = "/topic/current-trades";

/// Dealing range events across all symbols.
pub const DEALING_RANGE: &str = "/topic/dealing-range";

/// Second-generation event feed.
pub const V2_EVENTS: &str = "/topic/v2/events";

/// Events for one symbol, e.g. `/topic/events/EURUSD`.
#[must_use]
pub fn events_for(symbol: &str) -> String {
    format!("{EVENTS}/{symbol}")
}

/// Dealing range events for one symbol.
#[must_use]
pub fn dealing_range_for(symbol: &str) -> String {
    format!("{DEALING_RANGE}/{symbol}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_topics() {
        assert_eq!(events_for("EURUSD"), "/topic/events/EURUSD");
        assert_eq!(dealing_range_for("US30"), "/topic/dealing-range/US30");
    }
}
