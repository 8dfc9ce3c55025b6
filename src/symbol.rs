//! Canonical symbol type and per-exchange symbol tables.
//!
//! A [`Symbol`] is opaque outside this module: callers never construct
//! one from a raw exchange string directly, they go through a
//! [`SymbolTable`] so the mapping stays bidirectional and testable,
//! generalizing the free functions `symbol_to_exchange` /
//! `symbol_from_exchange` into a table-driven component with one entry
//! per exchange.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical symbol identifier, e.g. `BTC/USDT`. Immutable for the
/// lifetime of a session; cheap to clone (reference-counted string).
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(canonical: impl Into<Arc<str>>) -> Self {
        Self(canonical.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(s)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Symbol::new(s))
    }
}

/// The separator each exchange uses between base and quote asset, and
/// the case convention it expects native symbols in.
#[derive(Clone, Copy, Debug)]
pub struct NativeConvention {
    pub separator: Option<char>,
    pub uppercase: bool,
}

/// Known quote assets tried, longest first, when an exchange's native
/// symbols carry no separator at all (Binance, Bybit).
const CONCATENATED_QUOTES: [&str; 4] = ["USDT", "USDC", "BUSD", "USD"];

/// Bidirectional canonical <-> native symbol mapping for one exchange.
///
/// `to_native`/`from_native` are the identity of each other for any
/// symbol the table was built to cover ("Symbol
/// normalize then denormalize per exchange is the identity").
#[derive(Clone, Debug)]
pub struct SymbolTable {
    convention: NativeConventionKind,
}

#[derive(Clone, Copy, Debug)]
enum NativeConventionKind {
    /// Exchanges that use an explicit separator in native symbols
    /// (Gate.io `_`, OKX/Coinbase `-`).
    Separated(char),
    /// Exchanges whose native symbols concatenate base+quote with no
    /// separator (Binance, Bybit); quote assets are detected via a
    /// known-suffix list.
    Concatenated,
}

impl SymbolTable {
    pub fn separated(separator: char) -> Self {
        Self {
            convention: NativeConventionKind::Separated(separator),
        }
    }

    pub fn concatenated() -> Self {
        Self {
            convention: NativeConventionKind::Concatenated,
        }
    }

    /// Converts a canonical `BASE/QUOTE` symbol into its native form.
    pub fn to_native(&self, symbol: &Symbol) -> String {
        match self.convention {
            NativeConventionKind::Separated(sep) => symbol.as_str().replace('/', &sep.to_string()),
            NativeConventionKind::Concatenated => symbol.as_str().replace('/', ""),
        }
    }

    /// Converts a native exchange symbol into its canonical form.
    ///
    /// Falls back to treating the whole string as opaque if no known
    /// quote suffix matches (`Concatenated` case) — callers should log
    /// this as a protocol-decode warning since it means the symbol
    /// table is missing a quote asset.
    pub fn from_native(&self, native: &str) -> Symbol {
        match self.convention {
            NativeConventionKind::Separated(sep) => {
                Symbol::new(native.to_uppercase().replace(sep, "/"))
            }
            NativeConventionKind::Concatenated => {
                let upper = native.to_uppercase();
                for quote in CONCATENATED_QUOTES {
                    if let Some(base) = upper.strip_suffix(quote) {
                        if !base.is_empty() {
                            return Symbol::new(format!("{base}/{quote}"));
                        }
                    }
                }
                Symbol::new(upper)
            }
        }
    }
}

/// Registry of symbol tables keyed by exchange id, built once at
/// startup from the exchange adapter registry.
#[derive(Clone, Default)]
pub struct SymbolRegistry {
    tables: HashMap<&'static str, SymbolTable>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn register(&mut self, exchange: &'static str, table: SymbolTable) {
        self.tables.insert(exchange, table);
    }

    pub fn table(&self, exchange: &str) -> Option<&SymbolTable> {
        self.tables.get(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_round_trip() {
        let t = SymbolTable::concatenated();
        let sym = Symbol::new("BTC/USDT");
        let native = t.to_native(&sym);
        assert_eq!(native, "BTCUSDT");
        assert_eq!(t.from_native(&native), sym);
    }

    #[test]
    fn separated_round_trip() {
        let t = SymbolTable::separated('-');
        let sym = Symbol::new("ETH/USD");
        let native = t.to_native(&sym);
        assert_eq!(native, "ETH-USD");
        assert_eq!(t.from_native(&native), sym);
    }

    #[test]
    fn concatenated_picks_longest_known_quote() {
        let t = SymbolTable::concatenated();
        assert_eq!(t.from_native("BTCUSDT").as_str(), "BTC/USDT");
        assert_eq!(t.from_native("BTCUSD").as_str(), "BTC/USD");
    }
}
