use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Everything about an ETF that comes out of a fundamentals snapshot.
///
/// Only `ticker` is guaranteed; every other field is `None` when the provider
/// did not deliver it or delivered something unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InstrumentProfile {
    pub ticker: String,
    pub code: Option<String>,
    pub exchange: Option<String>,
    pub name: Option<String>,
    pub isin: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub domicile: Option<String>,
    pub index_name: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub yield_pct: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub holdings_count: Option<i32>,

    // Asset allocation, percent of net assets
    pub equity_us_pct: Option<f64>,
    pub equity_non_us_pct: Option<f64>,
    pub equity_pct: Option<f64>,
    pub bond_pct: Option<f64>,
    pub cash_pct: Option<f64>,
    pub other_pct: Option<f64>,

    // Market-cap buckets, percent of equity
    pub mega_cap_pct: Option<f64>,
    pub big_cap_pct: Option<f64>,
    pub medium_cap_pct: Option<f64>,
    pub small_cap_pct: Option<f64>,
    pub micro_cap_pct: Option<f64>,

    // Portfolio valuation ratios
    pub price_earnings: Option<f64>,
    pub price_book: Option<f64>,
    pub price_sales: Option<f64>,
    pub price_cash_flow: Option<f64>,
    pub dividend_yield_factor: Option<f64>,

    pub provider_updated_at: Option<NaiveDate>,
}

/// A persisted ETF record, keyed by ticker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Instrument {
    pub id: Uuid,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: InstrumentProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    pub fn new(profile: InstrumentProfile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.profile.ticker
    }
}
