use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{
    storable_holdings, storable_sector_weights, HoldingRecord, Instrument, InstrumentProfile,
    MetricSnapshot, NewHolding, NewSectorWeight, PriceBar, SectorWeightRecord,
};
use crate::store::EtfStore;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("✅ Database migrations applied");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl EtfStore for PgStore {
    async fn upsert_instrument(&self, profile: &InstrumentProfile) -> Result<Instrument, AppError> {
        Ok(db::instrument_queries::upsert(&self.pool, profile).await?)
    }

    async fn replace_holdings(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewHolding>,
    ) -> Result<u64, AppError> {
        let records = storable_holdings(rows, instrument_id, as_of);
        Ok(db::holding_queries::replace_holdings(&self.pool, instrument_id, &records).await?)
    }

    async fn replace_sector_weights(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewSectorWeight>,
    ) -> Result<u64, AppError> {
        let records = storable_sector_weights(rows, instrument_id, as_of);
        Ok(db::holding_queries::replace_sector_weights(&self.pool, instrument_id, &records).await?)
    }

    async fn append_price_bars(&self, bars: &[PriceBar]) -> Result<u64, AppError> {
        Ok(db::price_queries::insert_missing(&self.pool, bars).await?)
    }

    async fn upsert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<(), AppError> {
        Ok(db::metric_queries::upsert(&self.pool, snapshot).await?)
    }

    async fn instrument_by_ticker(&self, ticker: &str) -> Result<Option<Instrument>, AppError> {
        Ok(db::instrument_queries::fetch_by_ticker(&self.pool, ticker).await?)
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, AppError> {
        Ok(db::instrument_queries::fetch_all(&self.pool).await?)
    }

    async fn latest_holdings(&self, instrument_id: Uuid) -> Result<Vec<HoldingRecord>, AppError> {
        Ok(db::holding_queries::fetch_latest_holdings(&self.pool, instrument_id).await?)
    }

    async fn latest_sector_weights(
        &self,
        instrument_id: Uuid,
    ) -> Result<Vec<SectorWeightRecord>, AppError> {
        Ok(db::holding_queries::fetch_latest_sector_weights(&self.pool, instrument_id).await?)
    }

    async fn price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AppError> {
        Ok(db::price_queries::fetch_range(&self.pool, symbol, from, to).await?)
    }

    async fn latest_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>, AppError> {
        Ok(db::price_queries::fetch_latest_date(&self.pool, symbol).await?)
    }

    async fn latest_metric_snapshot(&self, ticker: &str) -> Result<Option<MetricSnapshot>, AppError> {
        Ok(db::metric_queries::fetch_latest(&self.pool, ticker).await?)
    }
}
