use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Instrument, InstrumentProfile};

const INSTRUMENT_COLUMNS: &str = "id, ticker, code, exchange, name, isin, currency, country, category,
    description, domicile, index_name, inception_date, yield_pct, expense_ratio, total_assets,
    holdings_count, equity_us_pct, equity_non_us_pct, equity_pct, bond_pct, cash_pct, other_pct,
    mega_cap_pct, big_cap_pct, medium_cap_pct, small_cap_pct, micro_cap_pct,
    price_earnings, price_book, price_sales, price_cash_flow, dividend_yield_factor,
    provider_updated_at, created_at, updated_at";

/// Insert or update an instrument by ticker. The id of an existing row is kept.
pub async fn upsert(pool: &PgPool, profile: &InstrumentProfile) -> Result<Instrument, sqlx::Error> {
    let sql = format!(
        "INSERT INTO instruments
         (id, ticker, code, exchange, name, isin, currency, country, category,
          description, domicile, index_name, inception_date, yield_pct, expense_ratio, total_assets,
          holdings_count, equity_us_pct, equity_non_us_pct, equity_pct, bond_pct, cash_pct, other_pct,
          mega_cap_pct, big_cap_pct, medium_cap_pct, small_cap_pct, micro_cap_pct,
          price_earnings, price_book, price_sales, price_cash_flow, dividend_yield_factor,
          provider_updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                 $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34)
         ON CONFLICT (ticker)
         DO UPDATE SET
             code = EXCLUDED.code,
             exchange = EXCLUDED.exchange,
             name = EXCLUDED.name,
             isin = EXCLUDED.isin,
             currency = EXCLUDED.currency,
             country = EXCLUDED.country,
             category = EXCLUDED.category,
             description = EXCLUDED.description,
             domicile = EXCLUDED.domicile,
             index_name = EXCLUDED.index_name,
             inception_date = EXCLUDED.inception_date,
             yield_pct = EXCLUDED.yield_pct,
             expense_ratio = EXCLUDED.expense_ratio,
             total_assets = EXCLUDED.total_assets,
             holdings_count = EXCLUDED.holdings_count,
             equity_us_pct = EXCLUDED.equity_us_pct,
             equity_non_us_pct = EXCLUDED.equity_non_us_pct,
             equity_pct = EXCLUDED.equity_pct,
             bond_pct = EXCLUDED.bond_pct,
             cash_pct = EXCLUDED.cash_pct,
             other_pct = EXCLUDED.other_pct,
             mega_cap_pct = EXCLUDED.mega_cap_pct,
             big_cap_pct = EXCLUDED.big_cap_pct,
             medium_cap_pct = EXCLUDED.medium_cap_pct,
             small_cap_pct = EXCLUDED.small_cap_pct,
             micro_cap_pct = EXCLUDED.micro_cap_pct,
             price_earnings = EXCLUDED.price_earnings,
             price_book = EXCLUDED.price_book,
             price_sales = EXCLUDED.price_sales,
             price_cash_flow = EXCLUDED.price_cash_flow,
             dividend_yield_factor = EXCLUDED.dividend_yield_factor,
             provider_updated_at = EXCLUDED.provider_updated_at,
             updated_at = NOW()
         RETURNING {}",
        INSTRUMENT_COLUMNS
    );

    sqlx::query_as::<_, Instrument>(&sql)
        .bind(Uuid::new_v4())
        .bind(&profile.ticker)
        .bind(&profile.code)
        .bind(&profile.exchange)
        .bind(&profile.name)
        .bind(&profile.isin)
        .bind(&profile.currency)
        .bind(&profile.country)
        .bind(&profile.category)
        .bind(&profile.description)
        .bind(&profile.domicile)
        .bind(&profile.index_name)
        .bind(profile.inception_date)
        .bind(profile.yield_pct)
        .bind(profile.expense_ratio)
        .bind(profile.total_assets)
        .bind(profile.holdings_count)
        .bind(profile.equity_us_pct)
        .bind(profile.equity_non_us_pct)
        .bind(profile.equity_pct)
        .bind(profile.bond_pct)
        .bind(profile.cash_pct)
        .bind(profile.other_pct)
        .bind(profile.mega_cap_pct)
        .bind(profile.big_cap_pct)
        .bind(profile.medium_cap_pct)
        .bind(profile.small_cap_pct)
        .bind(profile.micro_cap_pct)
        .bind(profile.price_earnings)
        .bind(profile.price_book)
        .bind(profile.price_sales)
        .bind(profile.price_cash_flow)
        .bind(profile.dividend_yield_factor)
        .bind(profile.provider_updated_at)
        .fetch_one(pool)
        .await
}

pub async fn fetch_by_ticker(pool: &PgPool, ticker: &str) -> Result<Option<Instrument>, sqlx::Error> {
    let sql = format!("SELECT {} FROM instruments WHERE ticker = $1", INSTRUMENT_COLUMNS);
    sqlx::query_as::<_, Instrument>(&sql)
        .bind(ticker)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Instrument>, sqlx::Error> {
    let sql = format!("SELECT {} FROM instruments ORDER BY ticker ASC", INSTRUMENT_COLUMNS);
    sqlx::query_as::<_, Instrument>(&sql).fetch_all(pool).await
}
