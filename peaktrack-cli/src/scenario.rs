//! TOML scenario configuration for replay runs.

use anyhow::{Context, Result};
use chrono::Utc;
use peaktrack_core::{DecimalAmount, Position, PositionId, PositionStatus, PositionType, TokenInfo};
use serde::Deserialize;
use std::path::Path;

/// A replayable scenario: the token pair plus the positions to seed.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub pair: PairConfig,
    /// Overrides the derived `positions|<token>|<vs_token>` storage prefix.
    pub storage_prefix: Option<String>,
    #[serde(default)]
    pub positions: Vec<PositionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PairConfig {
    pub token: TokenConfig,
    pub vs_token: TokenConfig,
}

#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Deserialize)]
pub struct PositionConfig {
    pub position_id: String,
    pub fill_price: DecimalAmount,
    pub token_amt: DecimalAmount,
    pub vs_token_amt: DecimalAmount,
    pub trigger_percent: f64,
    #[serde(default = "default_slippage")]
    pub sell_slippage_percent: f64,
    #[serde(default)]
    pub retry_sell_if_slippage_exceeded: bool,
}

fn default_slippage() -> f64 {
    0.5
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Storage prefix for this pair's tracker.
    pub fn storage_prefix(&self) -> String {
        self.storage_prefix.clone().unwrap_or_else(|| {
            format!(
                "positions|{}|{}",
                self.pair.token.symbol, self.pair.vs_token.symbol
            )
        })
    }

    /// Build the seeded positions as tracker inputs.
    pub fn seed_positions(&self) -> Vec<Position> {
        let token = self.pair.token.to_info();
        let vs_token = self.pair.vs_token.to_info();
        self.positions
            .iter()
            .map(|p| Position {
                position_id: PositionId::new(p.position_id.as_str()),
                position_type: PositionType::LongTrailingStopLoss,
                status: PositionStatus::Open,
                token: token.clone(),
                vs_token: vs_token.clone(),
                token_amt: p.token_amt.clone(),
                vs_token_amt: p.vs_token_amt.clone(),
                fill_price: p.fill_price.clone(),
                trigger_percent: p.trigger_percent,
                sell_slippage_percent: p.sell_slippage_percent,
                retry_sell_if_slippage_exceeded: p.retry_sell_if_slippage_exceeded,
                opened_at: Utc::now(),
            })
            .collect()
    }
}

impl TokenConfig {
    fn to_info(&self) -> TokenInfo {
        TokenInfo::new(self.address.as_str(), self.symbol.as_str(), self.decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[pair.token]
address = "So11111111111111111111111111111111111111112"
symbol = "WSOL"
decimals = 9

[pair.vs_token]
address = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
symbol = "USDC"
decimals = 6

[[positions]]
position_id = "pos-1"
fill_price = "250"
token_amt = "4.0"
vs_token_amt = "1000"
trigger_percent = 10.0

[[positions]]
position_id = "pos-2"
fill_price = "0.0000444"
token_amt = "1000000"
vs_token_amt = "44.4"
trigger_percent = 7.5
sell_slippage_percent = 1.0
retry_sell_if_slippage_exceeded = true
"#;

    #[test]
    fn parses_example_scenario() {
        let scenario: Scenario = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(scenario.storage_prefix(), "positions|WSOL|USDC");

        let seeded = scenario.seed_positions();
        assert_eq!(seeded.len(), 2);
        assert_eq!(seeded[0].fill_price, "250".parse().unwrap());
        assert_eq!(seeded[0].status, PositionStatus::Open);
        assert_eq!(seeded[1].trigger_percent, 7.5);
        assert!(seeded[1].retry_sell_if_slippage_exceeded);
    }

    #[test]
    fn explicit_prefix_wins() {
        let mut scenario: Scenario = toml::from_str(EXAMPLE).unwrap();
        scenario.storage_prefix = Some("custom".to_string());
        assert_eq!(scenario.storage_prefix(), "custom");
    }
}
