use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{HoldingRecord, SectorWeightRecord};

// 8 binds per holding row keeps a chunk well under the 65535 parameter limit
const INSERT_CHUNK: usize = 1000;

/// Replace every holding of an instrument with `rows`, in one transaction.
///
/// Existing rows for the instrument are deleted regardless of date, so at most
/// one snapshot is kept per instrument.
pub async fn replace_holdings(
    pool: &PgPool,
    instrument_id: Uuid,
    rows: &[HoldingRecord],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM holdings WHERE instrument_id = $1")
        .bind(instrument_id)
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO holdings
             (instrument_id, holding_ticker, name, sector, industry, country, weight, as_of_date) ",
        );
        query_builder.push_values(chunk, |mut b, h| {
            b.push_bind(h.instrument_id)
                .push_bind(&h.holding_ticker)
                .push_bind(&h.name)
                .push_bind(&h.sector)
                .push_bind(&h.industry)
                .push_bind(&h.country)
                .push_bind(h.weight)
                .push_bind(h.as_of_date);
        });
        inserted += query_builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn replace_sector_weights(
    pool: &PgPool,
    instrument_id: Uuid,
    rows: &[SectorWeightRecord],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM sector_weights WHERE instrument_id = $1")
        .bind(instrument_id)
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0;
    if !rows.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO sector_weights (instrument_id, sector, weight, as_of_date) ");
        query_builder.push_values(rows, |mut b, s| {
            b.push_bind(s.instrument_id)
                .push_bind(&s.sector)
                .push_bind(s.weight)
                .push_bind(s.as_of_date);
        });
        inserted = query_builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_latest_holdings(
    pool: &PgPool,
    instrument_id: Uuid,
) -> Result<Vec<HoldingRecord>, sqlx::Error> {
    sqlx::query_as::<_, HoldingRecord>(
        "SELECT instrument_id, holding_ticker, name, sector, industry, country, weight, as_of_date
         FROM holdings
         WHERE instrument_id = $1
           AND as_of_date = (SELECT MAX(as_of_date) FROM holdings WHERE instrument_id = $1)
         ORDER BY weight DESC, holding_ticker ASC",
    )
    .bind(instrument_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_latest_sector_weights(
    pool: &PgPool,
    instrument_id: Uuid,
) -> Result<Vec<SectorWeightRecord>, sqlx::Error> {
    sqlx::query_as::<_, SectorWeightRecord>(
        "SELECT instrument_id, sector, weight, as_of_date
         FROM sector_weights
         WHERE instrument_id = $1
           AND as_of_date = (SELECT MAX(as_of_date) FROM sector_weights WHERE instrument_id = $1)
         ORDER BY weight DESC, sector ASC",
    )
    .bind(instrument_id)
    .fetch_all(pool)
    .await
}
