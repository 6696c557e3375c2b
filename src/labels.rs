//! Human labels for well-known addresses.

use serde::Serialize;

/// Known addresses, lowercase.
const KNOWN_ADDRESSES: &[(&str, &str, AddressKind)] = &[
    ("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC Contract", AddressKind::Contract),
    ("0x7a250d5630b4cf539739df2c5dacb4c659f2488d", "Uniswap Router", AddressKind::Dex),
    ("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be", "Binance", AddressKind::Exchange),
    ("0x28c6c06298d514db089934071355e5743bf21d60", "Binance 2", AddressKind::Exchange),
    ("0xdfd5293d8e347dfe59e90efd55b2956a1343963d", "Binance 3", AddressKind::Exchange),
    ("0x21a31ee1afc51d94c2efccaa2092ad1028285549", "Binance Cold Wallet", AddressKind::Exchange),
    ("0xbe0eb53f46cd790cd13851d5eff43d12404d33e8", "Binance Cold Wallet 2", AddressKind::Exchange),
    ("0x5041ed759dd4afc3a72b8192c143f72f4724081a", "Coinbase", AddressKind::Exchange),
    ("0x71660c4005ba85c37ccec55d0c4493e66fe775d3", "Coinbase 2", AddressKind::Exchange),
    ("0xa910f92acdaf488fa6ef02174fb86208ad7722ba", "Kraken", AddressKind::Exchange),
    ("0x2b5634c42055806a59e9107ed44d43c426e58258", "Kucoin", AddressKind::Exchange),
    ("0x0d0707963952f2fba59dd06f2b425ace40b492fe", "Gate.io", AddressKind::Exchange),
    ("0x1111111254fb6c44bac0bed2854e76f90643097d", "1inch Router", AddressKind::Dex),
    ("0x881d40237659c251811cec9c364ef91dc08d300c", "Metamask Swap Router", AddressKind::Dex),
    ("0xdef1c0ded9bec7f1a1670819833240f027b25eff", "0x Exchange", AddressKind::Dex),
];

const BURN_PREFIX: &str = "0x0000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Exchange,
    Dex,
    Contract,
    Burn,
    Unknown,
}

fn lookup(address: &str) -> Option<&'static (&'static str, &'static str, AddressKind)> {
    KNOWN_ADDRESSES
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(address.trim()))
}

fn is_burn(address: &str) -> bool {
    let address = address.trim();
    address.len() >= BURN_PREFIX.len()
        && address.is_char_boundary(BURN_PREFIX.len())
        && address[..BURN_PREFIX.len()].eq_ignore_ascii_case(BURN_PREFIX)
}

pub fn label_of(address: &str) -> &'static str {
    if address.trim().is_empty() {
        return "Unknown";
    }
    if let Some(&(_, label, _)) = lookup(address) {
        return label;
    }
    if is_burn(address) {
        return "Burn Address";
    }
    "Address"
}

pub fn kind_of(address: &str) -> AddressKind {
    if let Some(&(_, _, kind)) = lookup(address) {
        return kind;
    }
    if is_burn(address) {
        return AddressKind::Burn;
    }
    AddressKind::Unknown
}

pub fn is_exchange(address: &str) -> bool {
    kind_of(address) == AddressKind::Exchange
}

pub fn is_dex(address: &str) -> bool {
    kind_of(address) == AddressKind::Dex
}

/// Stable hex color derived from the address text.
pub fn address_color(address: &str) -> String {
    if address.is_empty() {
        return "#cccccc".to_string();
    }
    let hash = address
        .bytes()
        .fold(0i32, |h, b| (b as i32).wrapping_add(h.wrapping_shl(5).wrapping_sub(h)));
    let [r, g, b] = [0, 8, 16].map(|shift| ((hash >> shift) & 0xFF) as u8);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_ignore_case() {
        assert_eq!(label_of("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be"), "Binance");
        assert_eq!(label_of("0x3F5CE5FBFE3E9AF3971DD833D26BA9B5C936F0BE"), "Binance");
        assert_eq!(label_of("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), "USDC Contract");
    }

    #[test]
    fn burn_and_fallbacks() {
        assert_eq!(label_of("0x0000000000000000000000000000000000000000"), "Burn Address");
        assert_eq!(label_of("0x000000000000000000000000000000000000dEaD"), "Burn Address");
        assert_eq!(label_of("0x1234567890abcdef1234567890abcdef12345678"), "Address");
        assert_eq!(label_of(""), "Unknown");
        assert_eq!(label_of("0x00"), "Address");
    }

    #[test]
    fn classes() {
        assert!(is_exchange("0xa910f92acdaf488fa6ef02174fb86208ad7722ba"));
        assert!(!is_exchange("0x7a250d5630b4cf539739df2c5dacb4c659f2488d"));
        assert!(is_dex("0x7a250d5630b4cf539739df2c5dacb4c659f2488d"));
        assert_eq!(kind_of("0x0000000000000000000000000000000000000000"), AddressKind::Burn);
        assert_eq!(kind_of("0xfeed"), AddressKind::Unknown);
    }

    #[test]
    fn color_is_deterministic() {
        let a = address_color("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be");
        assert_eq!(a, address_color("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be"));
        assert_eq!(a.len(), 7);
        assert!(a.starts_with('#'));
        assert_eq!(address_color(""), "#cccccc");
    }
}
