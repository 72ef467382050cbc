use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    storable_holdings, storable_sector_weights, HoldingRecord, Instrument, InstrumentProfile,
    MetricSnapshot, NewHolding, NewSectorWeight, PriceBar, SectorWeightRecord,
};
use crate::store::EtfStore;

/// Process-local store with the same semantics as [`PgStore`](super::PgStore).
///
/// Used for dry runs (`STORE_BACKEND=memory`) and tests.
#[derive(Default)]
pub struct MemoryStore {
    instruments: DashMap<String, Instrument>,
    holdings: DashMap<Uuid, Vec<HoldingRecord>>,
    sector_weights: DashMap<Uuid, Vec<SectorWeightRecord>>,
    prices: DashMap<String, BTreeMap<NaiveDate, PriceBar>>,
    snapshots: DashMap<String, BTreeMap<NaiveDate, MetricSnapshot>>,
    failing_tickers: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make instrument writes for `ticker` fail with a database error.
    pub fn fail_writes_for(&self, ticker: &str) {
        self.failing_tickers.lock().insert(ticker.to_string());
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn price_bar_count(&self, symbol: &str) -> usize {
        self.prices.get(symbol).map(|bars| bars.len()).unwrap_or(0)
    }

    fn check_writable(&self, ticker: &str) -> Result<(), AppError> {
        if self.failing_tickers.lock().contains(ticker) {
            return Err(AppError::Db(sqlx::Error::Protocol(format!(
                "simulated write failure for {}",
                ticker
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl EtfStore for MemoryStore {
    async fn upsert_instrument(&self, profile: &InstrumentProfile) -> Result<Instrument, AppError> {
        self.check_writable(&profile.ticker)?;

        let mut entry = self
            .instruments
            .entry(profile.ticker.clone())
            .or_insert_with(|| Instrument::new(profile.clone()));
        entry.profile = profile.clone();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn replace_holdings(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewHolding>,
    ) -> Result<u64, AppError> {
        let rows = storable_holdings(rows, instrument_id, as_of);
        let count = rows.len() as u64;
        self.holdings.insert(instrument_id, rows);
        Ok(count)
    }

    async fn replace_sector_weights(
        &self,
        instrument_id: Uuid,
        as_of: NaiveDate,
        rows: Vec<NewSectorWeight>,
    ) -> Result<u64, AppError> {
        let rows = storable_sector_weights(rows, instrument_id, as_of);
        let count = rows.len() as u64;
        self.sector_weights.insert(instrument_id, rows);
        Ok(count)
    }

    async fn append_price_bars(&self, bars: &[PriceBar]) -> Result<u64, AppError> {
        let mut inserted = 0;
        for bar in bars {
            let mut series = self.prices.entry(bar.symbol.clone()).or_default();
            if !series.contains_key(&bar.date) {
                series.insert(bar.date, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn upsert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<(), AppError> {
        self.snapshots
            .entry(snapshot.ticker.clone())
            .or_default()
            .insert(snapshot.as_of_date, snapshot.clone());
        Ok(())
    }

    async fn instrument_by_ticker(&self, ticker: &str) -> Result<Option<Instrument>, AppError> {
        Ok(self.instruments.get(ticker).map(|i| i.clone()))
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, AppError> {
        let mut all: Vec<Instrument> = self.instruments.iter().map(|i| i.clone()).collect();
        all.sort_by(|a, b| a.ticker().cmp(b.ticker()));
        Ok(all)
    }

    async fn latest_holdings(&self, instrument_id: Uuid) -> Result<Vec<HoldingRecord>, AppError> {
        let rows = self
            .holdings
            .get(&instrument_id)
            .map(|h| h.clone())
            .unwrap_or_default();
        let latest = rows.iter().map(|h| h.as_of_date).max();
        let mut rows: Vec<HoldingRecord> = rows
            .into_iter()
            .filter(|h| Some(h.as_of_date) == latest)
            .collect();
        rows.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.holding_ticker.cmp(&b.holding_ticker))
        });
        Ok(rows)
    }

    async fn latest_sector_weights(
        &self,
        instrument_id: Uuid,
    ) -> Result<Vec<SectorWeightRecord>, AppError> {
        let rows = self
            .sector_weights
            .get(&instrument_id)
            .map(|s| s.clone())
            .unwrap_or_default();
        let latest = rows.iter().map(|s| s.as_of_date).max();
        let mut rows: Vec<SectorWeightRecord> = rows
            .into_iter()
            .filter(|s| Some(s.as_of_date) == latest)
            .collect();
        rows.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.sector.cmp(&b.sector))
        });
        Ok(rows)
    }

    async fn price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AppError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .prices
            .get(symbol)
            .map(|series| series.range(from..=to).map(|(_, bar)| bar.clone()).collect())
            .unwrap_or_default())
    }

    async fn latest_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>, AppError> {
        Ok(self
            .prices
            .get(symbol)
            .and_then(|series| series.keys().next_back().copied()))
    }

    async fn latest_metric_snapshot(&self, ticker: &str) -> Result<Option<MetricSnapshot>, AppError> {
        Ok(self
            .snapshots
            .get(ticker)
            .and_then(|by_date| by_date.values().next_back().cloned()))
    }
}
