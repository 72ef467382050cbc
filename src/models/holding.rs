use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A constituent of an ETF as of a given date.
///
/// `weight` is percent of net assets, as delivered by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HoldingRecord {
    pub instrument_id: Uuid,
    pub holding_ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub weight: f64,
    pub as_of_date: NaiveDate,
}

/// Holding parsed from a fundamentals payload, before it is tied to an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHolding {
    pub holding_ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub weight: f64,
}

impl NewHolding {
    /// Rows with an empty identifier or a non-positive weight are noise.
    pub fn is_storable(&self) -> bool {
        !self.holding_ticker.trim().is_empty() && self.weight.is_finite() && self.weight > 0.0
    }

    pub fn into_record(self, instrument_id: Uuid, as_of_date: NaiveDate) -> HoldingRecord {
        HoldingRecord {
            instrument_id,
            holding_ticker: self.holding_ticker.trim().to_string(),
            name: self.name,
            sector: self.sector,
            industry: self.industry,
            country: self.country,
            weight: self.weight,
            as_of_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SectorWeightRecord {
    pub instrument_id: Uuid,
    pub sector: String,
    pub weight: f64,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSectorWeight {
    pub sector: String,
    pub weight: f64,
}

impl NewSectorWeight {
    pub fn is_storable(&self) -> bool {
        !self.sector.trim().is_empty() && self.weight.is_finite() && self.weight > 0.0
    }

    pub fn into_record(self, instrument_id: Uuid, as_of_date: NaiveDate) -> SectorWeightRecord {
        SectorWeightRecord {
            instrument_id,
            sector: self.sector.trim().to_string(),
            weight: self.weight,
            as_of_date,
        }
    }
}

/// Drop noise rows and collapse duplicate identifiers (last one wins) so the
/// batch insert never violates the per-date uniqueness constraint.
pub fn storable_holdings(
    rows: Vec<NewHolding>,
    instrument_id: Uuid,
    as_of_date: NaiveDate,
) -> Vec<HoldingRecord> {
    let mut out: Vec<HoldingRecord> = Vec::with_capacity(rows.len());
    for row in rows.into_iter().filter(NewHolding::is_storable) {
        let record = row.into_record(instrument_id, as_of_date);
        match out.iter_mut().find(|r| r.holding_ticker == record.holding_ticker) {
            Some(existing) => *existing = record,
            None => out.push(record),
        }
    }
    out
}

pub fn storable_sector_weights(
    rows: Vec<NewSectorWeight>,
    instrument_id: Uuid,
    as_of_date: NaiveDate,
) -> Vec<SectorWeightRecord> {
    let mut out: Vec<SectorWeightRecord> = Vec::with_capacity(rows.len());
    for row in rows.into_iter().filter(NewSectorWeight::is_storable) {
        let record = row.into_record(instrument_id, as_of_date);
        match out.iter_mut().find(|r| r.sector == record.sector) {
            Some(existing) => *existing = record,
            None => out.push(record),
        }
    }
    out
}
