//! Payload types pushed on the dashboard topics.
//!
//! Topics publish JSON arrays of these records. Timestamps are kept as the
//! ISO-8601 local date-time strings the server sends (no zone).
//!
//! # Example
//!
//! ```ignore
//! use tracker_link::{models::TradingSignal, topics};
//!
//! let mut signals = client.subscribe_to_topic(topics::TRADING_SIGNALS)?;
//! while let Some(batch) = signals.recv_as::<Vec<TradingSignal>>().await? {
//!     for signal in batch {
//!         println!("{} from {}", signal.signal.unwrap_or_default(), signal.source.unwrap_or_default());
//!     }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// TradingSignal
// ============================================================================

/// One row of the trading signals feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradingSignal {
    /// Signal label, e.g. `BUY`.
    pub signal: Option<String>,
    /// Producing strategy or indicator.
    pub source: Option<String>,
    /// When the signal fired.
    pub date_time: Option<String>,
}

// ============================================================================
// DashboardEvent
// ============================================================================

/// An indicator event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardEvent {
    pub indicator_name: Option<String>,
    /// Alert text as received from the charting platform.
    pub raw_message: Option<String>,
    pub date_time: Option<String>,
    pub signal: Option<String>,
    pub symbol: Option<String>,
}

// ============================================================================
// CurrentTrade
// ============================================================================

/// An open trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentTrade {
    pub account_name: Option<String>,
    pub id: Option<i64>,
    /// Unrealized profit and loss.
    #[serde(rename = "openPnL")]
    pub open_pnl: Option<f64>,
    pub trade_open_time: Option<String>,
    pub status: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_trading_signal_batch() {
        let batch: Vec<TradingSignal> = serde_json::from_value(json!([
            {"signal": "BUY", "source": "RSI", "dateTime": "2024-03-01T14:30:00"},
            {"signal": "SELL", "source": null}
        ]))
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].date_time.as_deref(), Some("2024-03-01T14:30:00"));
        assert_eq!(batch[1].source, None);
        assert_eq!(batch[1].date_time, None);
    }

    #[test]
    fn test_event_field_names() {
        let event = DashboardEvent {
            indicator_name: Some("MACD".into()),
            raw_message: Some("cross up".into()),
            symbol: Some("NQ".into()),
            ..DashboardEvent::default()
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["indicatorName"], "MACD");
        assert_eq!(value["rawMessage"], "cross up");
        assert_eq!(value["symbol"], "NQ");
    }

    #[test]
    fn test_current_trade_pnl_name() {
        let trade: CurrentTrade = serde_json::from_value(json!({
            "accountName": "sim-1",
            "id": 42,
            "openPnL": -12.5,
            "tradeOpenTime": "2024-03-01T09:31:05",
            "status": "OPEN",
            "extra": true
        }))
        .unwrap();

        assert_eq!(trade.id, Some(42));
        assert_eq!(trade.open_pnl, Some(-12.5));
        assert_eq!(serde_json::to_value(&trade).unwrap()["openPnL"], -12.5);
    }

    #[test]
    fn test_current_trades_feed() -> anyhow::Result<()> {
        let body = r#"[{"accountName":"sim-1","openPnL":3.25},{"accountName":"sim-2","id":7}]"#;
        let trades: Vec<CurrentTrade> = serde_json::from_str(body)?;

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].open_pnl, Some(3.25));
        assert_eq!(trades[1].open_pnl, None);
        assert_eq!(trades[1].id, Some(7));
        Ok(())
    }
}

