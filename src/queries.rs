//! GraphQL documents sent to the USDC subgraph, one type per named query.
//!
//! Amount and time parameters are passed as strings, matching the
//! subgraph's `BigInt` scalar.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::transfer::{
    AccountsResponse, ActivitySummaryResponse, FlowAnalysisResponse, TokensResponse,
    TransfersResponse,
};

pub trait NamedQuery {
    const NAME: &'static str;
    const DOCUMENT: &'static str;
    type Response: DeserializeOwned + Clone + Send + 'static;

    /// Variables move with the clock, so an older response is never asked
    /// for again. The gateway keeps only the newest one.
    const ROLLING_WINDOW: bool = false;

    fn variables(&self) -> Value;

    /// Identifies one response in the gateway cache.
    fn cache_key(&self) -> String {
        format!("{}:{}", Self::NAME, self.variables())
    }
}

macro_rules! transfer_query {
    ($head:literal, $args:literal) => {
        concat!(
            $head,
            " {\n    transfers(",
            $args,
            ") {\n      id\n      transaction\n      timestamp\n      block\n      value\n      from { id address balance }\n      to { id address balance }\n    }\n  }"
        )
    };
}

/// Recent transfers at or above a minimum amount, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhaleAlerts {
    pub min_amount: String,
    pub first: u32,
}

impl NamedQuery for WhaleAlerts {
    const NAME: &'static str = "WhaleAlerts";
    const DOCUMENT: &'static str = transfer_query!(
        "query WhaleAlerts($minAmount: BigInt!, $first: Int!)",
        "first: $first, where: { value_gte: $minAmount }, orderBy: timestamp, orderDirection: desc"
    );
    type Response = TransfersResponse;

    fn variables(&self) -> Value {
        json!({ "minAmount": self.min_amount, "first": self.first })
    }
}

/// The most recent transfers of any size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestTransfers {
    pub first: u32,
}

impl NamedQuery for LatestTransfers {
    const NAME: &'static str = "LatestTransfers";
    const DOCUMENT: &'static str = transfer_query!(
        "query LatestTransfers($first: Int!)",
        "first: $first, orderBy: timestamp, orderDirection: desc"
    );
    type Response = TransfersResponse;

    fn variables(&self) -> Value {
        json!({ "first": self.first })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenInfo;

impl NamedQuery for TokenInfo {
    const NAME: &'static str = "TokenInfo";
    const DOCUMENT: &'static str = "query TokenInfo {
    tokens(first: 1) {
      id
      name
      symbol
      decimals
      totalSupply
      transferCount
      holderCount
    }
  }";
    type Response = TokensResponse;

    fn variables(&self) -> Value {
        json!({})
    }
}

/// Transfer and whale counts over the last hour and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySummary {
    pub since_1h: String,
    pub since_24h: String,
    pub whale_min: String,
}

impl NamedQuery for ActivitySummary {
    const NAME: &'static str = "ActivitySummary";
    const ROLLING_WINDOW: bool = true;
    const DOCUMENT: &'static str = "query ActivitySummary($since1h: BigInt!, $since24h: BigInt!, $whaleMin: BigInt!) {
    last1h: transfers(first: 1000, where: { timestamp_gte: $since1h }) { id value }
    last24h: transfers(first: 1000, where: { timestamp_gte: $since24h }) { id value }
    whalesLast1h: transfers(first: 1000, where: { timestamp_gte: $since1h, value_gte: $whaleMin }) { id value }
    whalesLast24h: transfers(first: 1000, where: { timestamp_gte: $since24h, value_gte: $whaleMin }) { id value }
  }";
    type Response = ActivitySummaryResponse;

    fn variables(&self) -> Value {
        json!({
            "since1h": self.since_1h,
            "since24h": self.since_24h,
            "whaleMin": self.whale_min,
        })
    }
}

/// One page of transfers inside a closed time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransfersInRange {
    pub start_time: String,
    pub end_time: String,
    pub min_value: String,
    pub first: u32,
    pub skip: u32,
}

impl NamedQuery for TransfersInRange {
    const NAME: &'static str = "TransfersInRange";
    const DOCUMENT: &'static str = transfer_query!(
        "query TransfersInRange($startTime: BigInt!, $endTime: BigInt!, $minValue: BigInt!, $first: Int!, $skip: Int!)",
        "first: $first, skip: $skip, where: { timestamp_gte: $startTime, timestamp_lte: $endTime, value_gte: $minValue }, orderBy: timestamp, orderDirection: desc"
    );
    type Response = TransfersResponse;

    fn variables(&self) -> Value {
        json!({
            "startTime": self.start_time,
            "endTime": self.end_time,
            "minValue": self.min_value,
            "first": self.first,
            "skip": self.skip,
        })
    }
}

/// Top holders above a minimum balance, with their latest activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhaleLeaderboard {
    pub min_balance: String,
    pub first: u32,
}

impl NamedQuery for WhaleLeaderboard {
    const NAME: &'static str = "WhaleLeaderboard";
    const DOCUMENT: &'static str = "query WhaleLeaderboard($minBalance: BigInt!, $first: Int!) {
    accounts(first: $first, where: { balance_gt: $minBalance }, orderBy: balance, orderDirection: desc) {
      id
      address
      balance
      transfersFrom(first: 1, orderBy: timestamp, orderDirection: desc) { timestamp }
      transfersTo(first: 1, orderBy: timestamp, orderDirection: desc) { timestamp }
    }
  }";
    type Response = AccountsResponse;

    fn variables(&self) -> Value {
        json!({ "minBalance": self.min_balance, "first": self.first })
    }
}

/// Inflows and outflows of a single address since a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhaleFlowAnalysis {
    pub whale_address: String,
    pub since: String,
}

impl NamedQuery for WhaleFlowAnalysis {
    const NAME: &'static str = "WhaleFlowAnalysis";
    const ROLLING_WINDOW: bool = true;
    const DOCUMENT: &'static str = "query WhaleFlowAnalysis($whaleAddress: String!, $since: BigInt!) {
    inflowTransfers: transfers(first: 50, where: { to: $whaleAddress, timestamp_gt: $since }, orderBy: timestamp, orderDirection: desc) {
      id value timestamp transaction from { address } to { address }
    }
    outflowTransfers: transfers(first: 50, where: { from: $whaleAddress, timestamp_gt: $since }, orderBy: timestamp, orderDirection: desc) {
      id value timestamp transaction from { address } to { address }
    }
  }";
    type Response = FlowAnalysisResponse;

    fn variables(&self) -> Value {
        // Entity ids in the subgraph are lowercase hex.
        json!({ "whaleAddress": self.whale_address.to_lowercase(), "since": self.since })
    }
}

/// All transfers since a point in time, oldest first, for bucketing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyActivity {
    pub since: String,
}

impl NamedQuery for HourlyActivity {
    const NAME: &'static str = "HourlyActivity";
    const ROLLING_WINDOW: bool = true;
    const DOCUMENT: &'static str = "query HourlyActivity($since: BigInt!) {
    transfers(first: 1000, where: { timestamp_gt: $since }, orderBy: timestamp) {
      value
      timestamp
    }
  }";
    type Response = TransfersResponse;

    fn variables(&self) -> Value {
        json!({ "since": self.since })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_name_their_operation() {
        assert!(WhaleAlerts::DOCUMENT.starts_with("query WhaleAlerts("));
        assert!(WhaleAlerts::DOCUMENT.contains("value_gte: $minAmount"));
        assert!(WhaleAlerts::DOCUMENT.contains("from { id address balance }"));
        assert!(TransfersInRange::DOCUMENT.contains("skip: $skip"));
        assert!(TokenInfo::DOCUMENT.contains("holderCount"));
    }

    #[test]
    fn cache_key_tracks_variables() {
        let a = WhaleAlerts { min_amount: "50000000000".into(), first: 20 };
        let b = WhaleAlerts { min_amount: "250000000000".into(), first: 20 };
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), a.clone().cache_key());
        assert!(a.cache_key().starts_with("WhaleAlerts:"));
    }

    #[test]
    fn only_clock_relative_queries_roll() {
        assert!(ActivitySummary::ROLLING_WINDOW);
        assert!(WhaleFlowAnalysis::ROLLING_WINDOW);
        assert!(HourlyActivity::ROLLING_WINDOW);
        assert!(!WhaleAlerts::ROLLING_WINDOW);
        assert!(!TransfersInRange::ROLLING_WINDOW);
    }

    #[test]
    fn flow_address_is_lowercased() {
        let q = WhaleFlowAnalysis { whale_address: "0xABCdef".into(), since: "0".into() };
        assert_eq!(q.variables()["whaleAddress"], "0xabcdef");
    }

    #[test]
    fn amounts_are_strings() {
        let q = TransfersInRange {
            start_time: "1".into(),
            end_time: "2".into(),
            min_value: "50000000000".into(),
            first: 20,
            skip: 40,
        };
        let vars = q.variables();
        assert_eq!(vars["minValue"], "50000000000");
        assert_eq!(vars["skip"], 40);
    }
}
