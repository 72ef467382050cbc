pub mod holding_queries;
pub mod instrument_queries;
pub mod metric_queries;
pub mod price_queries;
