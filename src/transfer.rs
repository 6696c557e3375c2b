use serde::{Deserialize, Serialize};

/// Only `address` is guaranteed; nested selections pick the other fields
/// as they need them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub address: String,
    pub balance: String,
    pub transfers_from: Vec<ActivityStamp>,
    pub transfers_to: Vec<ActivityStamp>,
}

/// A `{ timestamp }` selection hanging off an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityStamp {
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transfer {
    pub id: String,
    pub transaction: String,
    pub timestamp: String, // unix seconds
    pub block: Option<String>,
    pub value: String, // raw amount in the token's smallest unit
    pub from: Account,
    pub to: Account,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<String>,
    pub total_supply: String,
    pub transfer_count: String,
    pub holder_count: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransfersResponse {
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensResponse {
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivitySummaryResponse {
    pub last1h: Vec<Transfer>,
    pub last24h: Vec<Transfer>,
    pub whales_last1h: Vec<Transfer>,
    pub whales_last24h: Vec<Transfer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowAnalysisResponse {
    pub inflow_transfers: Vec<Transfer>,
    pub outflow_transfers: Vec<Transfer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_transfer_decodes() {
        let json = r#"{"transfers":[{"value":"50000000000","timestamp":"1700000000",
            "from":{"address":"0xabc"},"to":{"address":"0xdef","balance":"1"}}]}"#;
        let resp: TransfersResponse = serde_json::from_str(json).unwrap();
        let t = &resp.transfers[0];
        assert_eq!(t.value, "50000000000");
        assert_eq!(t.id, "");
        assert_eq!(t.block, None);
        assert_eq!(t.from.address, "0xabc");
        assert_eq!(t.from.balance, "");
        assert_eq!(t.to.balance, "1");
    }

    #[test]
    fn missing_lists_are_empty() {
        let resp: ActivitySummaryResponse = serde_json::from_str(r#"{"last1h":[{"id":"a"}]}"#).unwrap();
        assert_eq!(resp.last1h.len(), 1);
        assert!(resp.whales_last24h.is_empty());

        let resp: TransfersResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.transfers.is_empty());
    }

    #[test]
    fn account_activity_lists() {
        let json = r#"{"accounts":[{"address":"0x1","balance":"5",
            "transfersFrom":[{"timestamp":"10"}],"transfersTo":[]}]}"#;
        let resp: AccountsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.accounts[0].transfers_from[0].timestamp, "10");
        assert!(resp.accounts[0].transfers_to.is_empty());
    }

    #[test]
    fn token_fields_are_camel_case() {
        let json = r#"{"tokens":[{"totalSupply":"1","transferCount":"2","holderCount":"3","symbol":"USDC"}]}"#;
        let resp: TokensResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.tokens[0].holder_count, "3");
        assert_eq!(resp.tokens[0].symbol.as_deref(), Some("USDC"));
    }
}
