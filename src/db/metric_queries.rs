use sqlx::PgPool;

use crate::models::MetricSnapshot;

pub async fn upsert(pool: &PgPool, snapshot: &MetricSnapshot) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO metric_snapshots
         (ticker, as_of_date, last_close, return_1m, return_3m, return_6m, return_ytd, return_1y,
          return_3y, return_5y, volatility_1y, sharpe_1y, max_drawdown_1y, beta_1y, rsi_14,
          sma_50, sma_200, high_52w, low_52w, hhi, top_10_weight, holdings_count, computed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                 $18, $19, $20, $21, $22, $23)
         ON CONFLICT (ticker, as_of_date)
         DO UPDATE SET
             last_close = EXCLUDED.last_close,
             return_1m = EXCLUDED.return_1m,
             return_3m = EXCLUDED.return_3m,
             return_6m = EXCLUDED.return_6m,
             return_ytd = EXCLUDED.return_ytd,
             return_1y = EXCLUDED.return_1y,
             return_3y = EXCLUDED.return_3y,
             return_5y = EXCLUDED.return_5y,
             volatility_1y = EXCLUDED.volatility_1y,
             sharpe_1y = EXCLUDED.sharpe_1y,
             max_drawdown_1y = EXCLUDED.max_drawdown_1y,
             beta_1y = EXCLUDED.beta_1y,
             rsi_14 = EXCLUDED.rsi_14,
             sma_50 = EXCLUDED.sma_50,
             sma_200 = EXCLUDED.sma_200,
             high_52w = EXCLUDED.high_52w,
             low_52w = EXCLUDED.low_52w,
             hhi = EXCLUDED.hhi,
             top_10_weight = EXCLUDED.top_10_weight,
             holdings_count = EXCLUDED.holdings_count,
             computed_at = EXCLUDED.computed_at",
    )
    .bind(&snapshot.ticker)
    .bind(snapshot.as_of_date)
    .bind(snapshot.last_close)
    .bind(snapshot.return_1m)
    .bind(snapshot.return_3m)
    .bind(snapshot.return_6m)
    .bind(snapshot.return_ytd)
    .bind(snapshot.return_1y)
    .bind(snapshot.return_3y)
    .bind(snapshot.return_5y)
    .bind(snapshot.volatility_1y)
    .bind(snapshot.sharpe_1y)
    .bind(snapshot.max_drawdown_1y)
    .bind(snapshot.beta_1y)
    .bind(snapshot.rsi_14)
    .bind(snapshot.sma_50)
    .bind(snapshot.sma_200)
    .bind(snapshot.high_52w)
    .bind(snapshot.low_52w)
    .bind(snapshot.hhi)
    .bind(snapshot.top_10_weight)
    .bind(snapshot.holdings_count)
    .bind(snapshot.computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_latest(pool: &PgPool, ticker: &str) -> Result<Option<MetricSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, MetricSnapshot>(
        "SELECT ticker, as_of_date, last_close, return_1m, return_3m, return_6m, return_ytd,
                return_1y, return_3y, return_5y, volatility_1y, sharpe_1y, max_drawdown_1y,
                beta_1y, rsi_14, sma_50, sma_200, high_52w, low_52w, hhi, top_10_weight,
                holdings_count, computed_at
         FROM metric_snapshots
         WHERE ticker = $1
         ORDER BY as_of_date DESC
         LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}
