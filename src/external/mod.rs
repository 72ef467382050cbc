pub mod eodhd;
pub mod etf_data_provider;
