mod checkpoint;
mod holding;
mod instrument;
mod metric_snapshot;
mod price_bar;

pub use checkpoint::{IngestionCheckpoint, RunStats};
pub use holding::{
    storable_holdings, storable_sector_weights, HoldingRecord, NewHolding, NewSectorWeight,
    SectorWeightRecord,
};
pub use instrument::{Instrument, InstrumentProfile};
pub use metric_snapshot::MetricSnapshot;
pub use price_bar::{to_series, PriceBar, SeriesPoint};
