//! Append-only trade journal
//!
//! One line per event:
//! `2025-05-01T14:30:00+00:00 | ENTRY | BUY 1 | Price: 21250.25`
//! `2025-05-01T14:41:12+00:00 | EXIT | Price: 21260.25 | Realized PnL: $20.00 | Change: $20.00`

use crate::execution::TradeAction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Text log of entries and exits
#[derive(Debug, Clone)]
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record_entry(
        &self,
        action: TradeAction,
        size: u32,
        price: Decimal,
    ) -> anyhow::Result<()> {
        self.append(&entry_line(Utc::now(), action, size, price)).await
    }

    /// `realized` is the session total, `change` this trade's contribution
    pub async fn record_exit(
        &self,
        price: Decimal,
        realized: Decimal,
        change: Decimal,
    ) -> anyhow::Result<()> {
        self.append(&exit_line(Utc::now(), price, realized, change)).await
    }

    async fn append(&self, line: &str) -> anyhow::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

pub fn entry_line(ts: DateTime<Utc>, action: TradeAction, size: u32, price: Decimal) -> String {
    format!("{} | ENTRY | {} {} | Price: {}", ts.to_rfc3339(), action, size, price)
}

pub fn exit_line(ts: DateTime<Utc>, price: Decimal, realized: Decimal, change: Decimal) -> String {
    format!(
        "{} | EXIT | Price: {} | Realized PnL: ${:.2} | Change: ${:.2}",
        ts.to_rfc3339(),
        price,
        realized,
        change
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn test_line_format() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 1, 14, 30, 0).unwrap();
        assert_eq!(
            entry_line(ts, TradeAction::Buy, 1, dec!(21250.25)),
            "2025-05-01T14:30:00+00:00 | ENTRY | BUY 1 | Price: 21250.25"
        );
        assert_eq!(
            exit_line(ts, dec!(21240), dec!(-19.5), dec!(-20)),
            "2025-05-01T14:30:00+00:00 | EXIT | Price: 21240 | Realized PnL: $-19.50 | Change: $-20.00"
        );
    }

    #[tokio::test]
    async fn test_appends_lines() {
        let dir = tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().join("trades.txt"));

        journal
            .record_entry(TradeAction::Sell, 2, dec!(21250))
            .await
            .unwrap();
        journal
            .record_exit(dec!(21240), dec!(40), dec!(40))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(journal.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| ENTRY | SELL 2 | Price: 21250"));
        assert!(lines[1].contains("| EXIT | Price: 21240 | Realized PnL: $40.00"));
    }
}
