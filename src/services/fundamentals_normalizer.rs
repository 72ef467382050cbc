//! Fundamentals payload → instrument, holdings and sector weights.
//!
//! Parsing happens in two steps. The raw payload is read into an intermediate
//! schema where every field is optional and every reader is tolerant of
//! renamed keys, numeric strings and wrong JSON types. The intermediate is then
//! normalized into the persisted shapes. Neither step can fail: anything not
//! understood becomes `None`.

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{InstrumentProfile, NewHolding, NewSectorWeight};
use crate::utils::lenient::{self, normalize_key};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeneral {
    pub code: Option<String>,
    pub instrument_type: Option<String>,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub isin: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub updated_at: Option<NaiveDate>,
}

impl RawGeneral {
    fn read(v: &Value) -> Self {
        Self {
            code: lenient::string_field(v, &["Code", "code"]),
            instrument_type: lenient::string_field(v, &["Type", "type"]),
            name: lenient::string_field(v, &["Name", "name"]),
            exchange: lenient::string_field(v, &["Exchange", "exchange"]),
            currency: lenient::string_field(v, &["CurrencyCode", "Currency", "currency"]),
            country: lenient::string_field(v, &["CountryISO", "CountryName", "Country"]),
            isin: lenient::string_field(v, &["ISIN", "Isin"]),
            description: lenient::string_field(v, &["Description", "description"]),
            category: lenient::string_field(v, &["Category", "category"]),
            updated_at: lenient::date_field(v, &["UpdatedAt", "updated_at"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAllocation {
    pub category: String,
    pub net_assets_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMarketCap {
    pub mega: Option<f64>,
    pub big: Option<f64>,
    pub medium: Option<f64>,
    pub small: Option<f64>,
    pub micro: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawValuations {
    pub price_earnings: Option<f64>,
    pub price_book: Option<f64>,
    pub price_sales: Option<f64>,
    pub price_cash_flow: Option<f64>,
    pub dividend_yield_factor: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHolding {
    pub key: Option<String>,
    pub code: Option<String>,
    pub exchange: Option<String>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub weight: Option<f64>,
}

impl RawHolding {
    fn read(key: Option<&str>, v: &Value) -> Self {
        Self {
            key: key.map(str::to_string),
            code: lenient::string_field(v, &["Code", "code", "Ticker"]),
            exchange: lenient::string_field(v, &["Exchange", "exchange"]),
            name: lenient::string_field(v, &["Name", "name"]),
            sector: lenient::string_field(v, &["Sector", "sector"]),
            industry: lenient::string_field(v, &["Industry", "industry"]),
            country: lenient::string_field(v, &["Country", "country"]),
            weight: lenient::f64_field(v, &["Assets_%", "Assets %", "Weight", "weight"]),
        }
    }

    /// `CODE.EXCHANGE` when both parts are known, else whatever identifies it.
    fn ticker(&self) -> Option<String> {
        match (&self.code, &self.exchange) {
            (Some(code), Some(exchange)) => Some(format!("{}.{}", code, exchange)),
            (Some(code), None) => Some(code.clone()),
            (None, _) => self.key.clone().filter(|k| !k.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSectorWeight {
    pub sector: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEtfData {
    pub isin: Option<String>,
    pub domicile: Option<String>,
    pub index_name: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub yield_pct: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub holdings_count: Option<i64>,
    pub asset_allocation: Vec<RawAllocation>,
    pub market_cap: RawMarketCap,
    pub valuations: RawValuations,
    /// `None` when the payload carried no holdings block at all.
    pub holdings: Option<Vec<RawHolding>>,
    pub sector_weights: Option<Vec<RawSectorWeight>>,
}

impl RawEtfData {
    fn read(v: &Value) -> Self {
        let asset_allocation = lenient::entries(v, &["Asset_Allocation", "AssetAllocation"])
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, entry)| {
                let category = key
                    .map(str::to_string)
                    .or_else(|| lenient::string_field(entry, &["Category", "Type"]))?;
                Some(RawAllocation {
                    category,
                    net_assets_pct: lenient::f64_field(
                        entry,
                        &["Net_Assets_%", "Net_Assets %", "Net Assets %", "Long_%"],
                    ),
                })
            })
            .collect();

        let market_cap = lenient::object_field(v, &["Market_Capitalisation", "Market_Capitalization"])
            .map(|m| RawMarketCap {
                mega: lenient::f64_field(m, &["Mega"]),
                big: lenient::f64_field(m, &["Big", "Large"]),
                medium: lenient::f64_field(m, &["Medium", "Mid"]),
                small: lenient::f64_field(m, &["Small"]),
                micro: lenient::f64_field(m, &["Micro"]),
            })
            .unwrap_or_default();

        let valuations = lenient::object_field(v, &["Valuations_Growth", "ValuationsGrowth"])
            .and_then(|vg| {
                lenient::object_field(vg, &["Valuations_Rates_Portfolio", "Valuations_Rates"])
            })
            .map(|r| RawValuations {
                price_earnings: lenient::f64_field(r, &["Price/Prospective Earnings", "Price/Earnings"]),
                price_book: lenient::f64_field(r, &["Price/Book"]),
                price_sales: lenient::f64_field(r, &["Price/Sales"]),
                price_cash_flow: lenient::f64_field(r, &["Price/Cash Flow"]),
                dividend_yield_factor: lenient::f64_field(r, &["Dividend-Yield Factor", "Dividend Yield Factor"]),
            })
            .unwrap_or_default();

        let holdings = lenient::entries(v, &["Holdings", "holdings"]).map(|rows| {
            rows.into_iter()
                .filter(|(_, entry)| entry.is_object())
                .map(|(key, entry)| RawHolding::read(key, entry))
                .collect()
        });

        let sector_weights = lenient::entries(v, &["Sector_Weights", "SectorWeights"]).map(|rows| {
            rows.into_iter()
                .map(|(key, entry)| RawSectorWeight {
                    sector: key
                        .map(str::to_string)
                        .or_else(|| lenient::string_field(entry, &["Sector", "Name"])),
                    // Either {"Equity_%": "12.1"} or a bare number
                    weight: lenient::f64_field(entry, &["Equity_%", "Equity %", "Weight"])
                        .or_else(|| lenient::f64_from(entry)),
                })
                .collect()
        });

        Self {
            isin: lenient::string_field(v, &["ISIN"]),
            domicile: lenient::string_field(v, &["Domicile"]),
            index_name: lenient::string_field(v, &["Index_Name", "IndexName"]),
            inception_date: lenient::date_field(v, &["Inception_Date", "InceptionDate"]),
            yield_pct: lenient::f64_field(v, &["Yield"]),
            expense_ratio: lenient::f64_field(v, &["NetExpenseRatio", "Ongoing_Charge", "Max_Annual_Mgmt_Charge"]),
            total_assets: lenient::f64_field(v, &["TotalAssets", "Total_Assets"]),
            holdings_count: lenient::i64_field(v, &["Holdings_Count", "HoldingsCount"]),
            asset_allocation,
            market_cap,
            valuations,
            holdings,
            sector_weights,
        }
    }

    fn allocation(&self, normalized: &str) -> Option<f64> {
        self.asset_allocation
            .iter()
            .find(|a| normalize_key(&a.category) == normalized)
            .and_then(|a| a.net_assets_pct)
    }
}

/// Intermediate view of a fundamentals payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFundamentals {
    pub general: Option<RawGeneral>,
    pub etf_data: Option<RawEtfData>,
}

impl RawFundamentals {
    pub fn read(payload: &Value) -> Self {
        Self {
            general: lenient::object_field(payload, &["General", "general"]).map(RawGeneral::read),
            etf_data: lenient::object_field(payload, &["ETF_Data", "ETFData", "EtfData"]).map(RawEtfData::read),
        }
    }
}

/// What a sync persists for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFundamentals {
    pub profile: InstrumentProfile,
    /// `None` leaves stored holdings untouched; `Some(vec![])` clears them.
    pub holdings: Option<Vec<NewHolding>>,
    pub sector_weights: Option<Vec<NewSectorWeight>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Complete(NormalizedFundamentals),
    /// The payload lacks the fields that identify an instrument.
    NoData(String),
}

/// Combined equity share: US + non-US when both are reported, otherwise
/// whichever one is.
pub fn combined_equity(us: Option<f64>, non_us: Option<f64>) -> Option<f64> {
    match (us, non_us) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

pub fn normalize(ticker: &str, payload: &Value) -> Normalized {
    let raw = RawFundamentals::read(payload);

    let general = match raw.general {
        Some(g) if g.name.is_some() => g,
        Some(_) => return Normalized::NoData("General.Name missing".to_string()),
        None => return Normalized::NoData("General block missing".to_string()),
    };
    let etf = raw.etf_data.unwrap_or_default();

    let holdings = etf.holdings.as_ref().map(|rows| {
        rows.iter()
            .filter_map(|h| {
                Some(NewHolding {
                    holding_ticker: h.ticker()?,
                    name: h.name.clone(),
                    sector: h.sector.clone(),
                    industry: h.industry.clone(),
                    country: h.country.clone(),
                    weight: h.weight?,
                })
            })
            .collect::<Vec<_>>()
    });

    let sector_weights = etf.sector_weights.as_ref().map(|rows| {
        rows.iter()
            .filter_map(|s| {
                Some(NewSectorWeight {
                    sector: s.sector.clone()?,
                    weight: s.weight?,
                })
            })
            .collect::<Vec<_>>()
    });

    let holdings_count = etf
        .holdings_count
        .or_else(|| etf.holdings.as_ref().map(|h| h.len() as i64))
        .and_then(|n| i32::try_from(n).ok());

    let equity_us_pct = etf.allocation("stockus");
    let equity_non_us_pct = etf.allocation("stocknonus");

    let (code, exchange) = match ticker.rsplit_once('.') {
        Some((code, exchange)) => (Some(code.to_string()), Some(exchange.to_string())),
        None => (general.code.clone(), general.exchange.clone()),
    };

    let profile = InstrumentProfile {
        ticker: ticker.to_string(),
        code: code.or(general.code),
        exchange: exchange.or(general.exchange),
        name: general.name,
        isin: general.isin.or(etf.isin.clone()),
        currency: general.currency,
        country: general.country,
        category: general.category,
        description: general.description,
        domicile: etf.domicile.clone(),
        index_name: etf.index_name.clone(),
        inception_date: etf.inception_date,
        yield_pct: etf.yield_pct,
        expense_ratio: etf.expense_ratio,
        total_assets: etf.total_assets,
        holdings_count,
        equity_us_pct,
        equity_non_us_pct,
        equity_pct: combined_equity(equity_us_pct, equity_non_us_pct),
        bond_pct: etf.allocation("bond"),
        cash_pct: etf.allocation("cash"),
        other_pct: etf.allocation("other"),
        mega_cap_pct: etf.market_cap.mega,
        big_cap_pct: etf.market_cap.big,
        medium_cap_pct: etf.market_cap.medium,
        small_cap_pct: etf.market_cap.small,
        micro_cap_pct: etf.market_cap.micro,
        price_earnings: etf.valuations.price_earnings,
        price_book: etf.valuations.price_book,
        price_sales: etf.valuations.price_sales,
        price_cash_flow: etf.valuations.price_cash_flow,
        dividend_yield_factor: etf.valuations.dividend_yield_factor,
        provider_updated_at: general.updated_at,
    };

    Normalized::Complete(NormalizedFundamentals {
        profile,
        holdings,
        sector_weights,
    })
}
