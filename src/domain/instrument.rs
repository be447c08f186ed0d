//! Instrument reference data and the symbol catalog.
//!
//! The catalog is read-only while requests run. It is built either from the
//! built-in seed list or from a catalog file, and is only modified by the
//! administrative population step ([`Catalog::populate`]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::BacktestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Index,
    Stock,
    CurrencyPair,
    Commodity,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Index,
        Category::Stock,
        Category::CurrencyPair,
        Category::Commodity,
    ];

    /// Three-letter storage code.
    pub fn code(&self) -> &'static str {
        match self {
            Category::Index => "IDX",
            Category::Stock => "STK",
            Category::CurrencyPair => "CRY",
            Category::Commodity => "COM",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Index => "Index",
            Category::Stock => "Stock",
            Category::CurrencyPair => "Currency Pair",
            Category::Commodity => "Commodity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown instrument category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the storage code or the label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        match needle.as_str() {
            "idx" | "index" => Ok(Category::Index),
            "stk" | "stock" => Ok(Category::Stock),
            "cry" | "currency" | "currency pair" => Ok(Category::CurrencyPair),
            "com" | "commodity" => Ok(Category::Commodity),
            _ => Err(UnknownCategory(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub category: Category,
}

impl Instrument {
    pub fn new(symbol: &str, name: &str, category: Category) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            name: name.to_string(),
            category,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.category)
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

const SEED: &[(&str, &str, Category)] = &[
    ("^GSPC", "S&P 500", Category::Index),
    ("^IXIC", "NASDAQ Composite", Category::Index),
    ("^DJI", "Dow Jones Industrial Average", Category::Index),
    ("^FTSE", "FTSE 100 (UK)", Category::Index),
    ("^N225", "Nikkei 225 (Japan)", Category::Index),
    ("IMOEX.ME", "MOEX Russia Index", Category::Index),
    ("^BSESN", "BSE SENSEX (India)", Category::Index),
    ("SPY", "SPDR S&P 500 ETF Trust", Category::Index),
    ("AAPL", "Apple Inc.", Category::Stock),
    ("MSFT", "Microsoft Corp.", Category::Stock),
    ("GOOGL", "Alphabet Inc. (Google Class C)", Category::Stock),
    ("AMZN", "Amazon.com, Inc.", Category::Stock),
    ("TSLA", "Tesla, Inc.", Category::Stock),
    ("NVDA", "NVIDIA Corporation", Category::Stock),
    ("JPM", "JPMorgan Chase & Co.", Category::Stock),
    ("V", "Visa Inc.", Category::Stock),
    ("RELIANCE.NS", "Reliance Industries Limited (India)", Category::Stock),
    ("BABA", "Alibaba Group Holding Limited", Category::Stock),
    ("EURUSD=X", "EUR to USD", Category::CurrencyPair),
    ("GBPUSD=X", "GBP to USD", Category::CurrencyPair),
    ("USDJPY=X", "USD to JPY", Category::CurrencyPair),
    ("USDCAD=X", "USD to CAD", Category::CurrencyPair),
    ("AUDUSD=X", "AUD to USD", Category::CurrencyPair),
    ("EURGBP=X", "EUR to GBP", Category::CurrencyPair),
    ("INR=X", "USD to INR", Category::CurrencyPair),
    ("CL=F", "Crude Oil WTI Futures", Category::Commodity),
    ("GC=F", "Gold Futures", Category::Commodity),
    ("SI=F", "Silver Futures", Category::Commodity),
    ("HG=F", "Copper Futures", Category::Commodity),
    ("ZS=F", "Soybean Futures", Category::Commodity),
    ("NG=F", "Natural Gas Futures", Category::Commodity),
    ("GLD", "SPDR Gold Shares ETF", Category::Commodity),
    ("SLV", "iShares Silver Trust ETF", Category::Commodity),
];

/// Outcome counts of a population run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub removed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    instruments: BTreeMap<String, Instrument>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_entries() -> Vec<Instrument> {
        SEED.iter()
            .map(|(symbol, name, category)| Instrument::new(symbol, name, *category))
            .collect()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.populate(Self::seed_entries(), false);
        catalog
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(&normalize_symbol(symbol))
    }

    pub fn lookup(&self, symbol: &str) -> Result<&Instrument, BacktestError> {
        self.get(symbol).ok_or_else(|| BacktestError::NotFound {
            symbol: normalize_symbol(symbol),
        })
    }

    /// Instruments sorted by symbol.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .values()
            .filter(move |i| i.category == category)
    }

    /// Insert or update entries keyed by symbol; optionally clear first.
    pub fn populate(&mut self, entries: Vec<Instrument>, clear: bool) -> PopulateSummary {
        let mut summary = PopulateSummary::default();
        if clear {
            summary.removed = self.instruments.len();
            self.instruments.clear();
        }

        for entry in entries {
            match self.instruments.get_mut(&entry.symbol) {
                None => {
                    self.instruments.insert(entry.symbol.clone(), entry);
                    summary.created += 1;
                }
                Some(existing) if *existing != entry => {
                    *existing = entry;
                    summary.updated += 1;
                }
                Some(_) => summary.unchanged += 1,
            }
        }

        summary
    }
}
