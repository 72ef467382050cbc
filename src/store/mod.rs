//! Persistence for ingested instruments, holdings, prices and metric snapshots.
//!
//! Writes are idempotent: instruments upsert by ticker, holdings and sector
//! weights are replaced wholesale per instrument, price bars are only inserted
//! when the (symbol, date) pair is new, and metric snapshots upsert by
//! (ticker, as_of_date).

pub mod checkpoint;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    HoldingRecord, Instrument, InstrumentProfile, MetricSnapshot, NewHolding, NewSectorWeight,
    PriceBar, SectorWeightRecord,
};

pub use checkpoint::CheckpointStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait EtfStore: Send + Sync {
    async fn upsert_instrument(&self, profile: &InstrumentProfile) -> Result<Instrument, AppError>;

    /// Delete the instrument's holdings, then insert `rows` dated `as_of` in one
    /// batch. Noise rows (empty identifier, non-positive weight) are dropped and
    /// duplicate identifiers collapse to the last one. Returns rows written.
    async fn replace_holdings(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewHolding>,
    ) -> Result<u64, AppError>;

    /// Same contract as [`replace_holdings`](EtfStore::replace_holdings), keyed by sector name.
    async fn replace_sector_weights(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewSectorWeight>,
    ) -> Result<u64, AppError>;

    /// Insert bars whose (symbol, date) is not stored yet. Returns rows written.
    async fn append_price_bars(&self, bars: &[PriceBar]) -> Result<u64, AppError>;

    async fn upsert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<(), AppError>;

    async fn instrument_by_ticker(&self, ticker: &str) -> Result<Option<Instrument>, AppError>;

    async fn list_instruments(&self) -> Result<Vec<Instrument>, AppError>;

    async fn latest_holdings(&self, instrument_id: Uuid) -> Result<Vec<HoldingRecord>, AppError>;

    async fn latest_sector_weights(
        &self,
        instrument_id: Uuid,
    ) -> Result<Vec<SectorWeightRecord>, AppError>;

    /// Bars in `[from, to]`, oldest first.
    async fn price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AppError>;

    async fn latest_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>, AppError>;

    async fn latest_metric_snapshot(&self, ticker: &str) -> Result<Option<MetricSnapshot>, AppError>;
}
