use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::PriceBar;

const INSERT_CHUNK: usize = 2000;

/// Insert bars that are not stored yet; existing (symbol, date) rows are left untouched.
///
/// Returns the number of rows actually inserted.
pub async fn insert_missing(pool: &PgPool, bars: &[PriceBar]) -> Result<u64, sqlx::Error> {
    if bars.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for chunk in bars.chunks(INSERT_CHUNK) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO price_bars (symbol, date, open, high, low, close, adjusted_close, volume) ",
        );
        query_builder.push_values(chunk, |mut b, bar| {
            b.push_bind(&bar.symbol)
                .push_bind(bar.date)
                .push_bind(bar.open)
                .push_bind(bar.high)
                .push_bind(bar.low)
                .push_bind(bar.close)
                .push_bind(bar.adjusted_close)
                .push_bind(bar.volume);
        });
        query_builder.push(" ON CONFLICT (symbol, date) DO NOTHING");

        inserted += query_builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_range(
    pool: &PgPool,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PriceBar>, sqlx::Error> {
    sqlx::query_as::<_, PriceBar>(
        "SELECT symbol, date, open, high, low, close, adjusted_close, volume
         FROM price_bars
         WHERE symbol = $1 AND date >= $2 AND date <= $3
         ORDER BY date ASC",
    )
    .bind(symbol)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn fetch_latest_date(pool: &PgPool, symbol: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<NaiveDate>>("SELECT MAX(date) FROM price_bars WHERE symbol = $1")
        .bind(symbol)
        .fetch_one(pool)
        .await
}
