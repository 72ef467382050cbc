use crate::external::etf_data_provider::{EtfDataProvider, ExternalPriceBar, ProviderError, SymbolListing};
use crate::utils::lenient;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Longest response body kept inside an error message.
const MAX_ERROR_BODY: usize = 300;

/// HTTP adapter for the EOD Historical Data API.
pub struct EodhdProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EodhdProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .query(&[("api_token", self.api_key.as_str()), ("fmt", "json")])
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

/// Parse `/exchange-symbol-list` output. Rows without a code are skipped.
pub fn parse_symbol_list(body: &Value, exchange: &str) -> Result<Vec<SymbolListing>, ProviderError> {
    let rows = body
        .as_array()
        .ok_or_else(|| ProviderError::Parse("symbol list is not an array".into()))?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let code = lenient::field(row, &["Code", "code"]).and_then(lenient::string_from)?;
            Some(SymbolListing {
                code,
                name: lenient::field(row, &["Name", "name"]).and_then(lenient::string_from),
                exchange: exchange.to_string(),
                instrument_type: lenient::field(row, &["Type", "type"]).and_then(lenient::string_from),
                currency: lenient::field(row, &["Currency", "currency"]).and_then(lenient::string_from),
            })
        })
        .collect())
}

/// Parse `/eod` output into bars, oldest first. Rows without a date are skipped.
pub fn parse_eod_bars(body: &Value) -> Result<Vec<ExternalPriceBar>, ProviderError> {
    let rows = body
        .as_array()
        .ok_or_else(|| ProviderError::Parse("price history is not an array".into()))?;

    let mut bars: Vec<ExternalPriceBar> = rows
        .iter()
        .filter_map(|row| {
            let date = lenient::field(row, &["date", "Date"]).and_then(lenient::date_from)?;
            let num = |names: &[&str]| lenient::field(row, names).and_then(lenient::f64_from);
            Some(ExternalPriceBar {
                date,
                open: num(&["open", "Open"]),
                high: num(&["high", "High"]),
                low: num(&["low", "Low"]),
                close: num(&["close", "Close"]),
                adjusted_close: num(&["adjusted_close", "adjustedClose", "Adjusted_close"]),
                volume: lenient::field(row, &["volume", "Volume"]).and_then(lenient::i64_from),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

#[async_trait]
impl EtfDataProvider for EodhdProvider {
    async fn list_symbols(
        &self,
        exchange: &str,
        instrument_type: &str,
    ) -> Result<Vec<SymbolListing>, ProviderError> {
        let body = self
            .get_json(
                &format!("exchange-symbol-list/{}", exchange),
                &[("type", instrument_type.to_lowercase())],
            )
            .await?;
        parse_symbol_list(&body, exchange)
    }

    async fn fundamentals(&self, ticker: &str) -> Result<Value, ProviderError> {
        self.get_json(&format!("fundamentals/{}", ticker), &[]).await
    }

    async fn historical_prices(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExternalPriceBar>, ProviderError> {
        let body = self
            .get_json(
                &format!("eod/{}", ticker),
                &[
                    ("from", from.format("%Y-%m-%d").to_string()),
                    ("to", to.format("%Y-%m-%d").to_string()),
                    ("period", "d".to_string()),
                ],
            )
            .await?;
        parse_eod_bars(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn symbol_list_uses_requested_exchange_code() {
        let body = json!([
            {"Code": "SPY", "Name": "SPDR S&P 500 ETF Trust", "Exchange": "NYSE ARCA", "Type": "ETF", "Currency": "USD"},
            {"Code": "", "Name": "blank"},
            {"Name": "no code"}
        ]);

        let listings = parse_symbol_list(&body, "US").unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].ticker(), "SPY.US");
        assert_eq!(listings[0].instrument_type.as_deref(), Some("ETF"));
    }

    #[test]
    fn symbol_list_must_be_array() {
        assert!(parse_symbol_list(&json!({"error": "x"}), "US").is_err());
    }

    #[test]
    fn eod_bars_are_sorted_and_tolerant() {
        let body = json!([
            {"date": "2024-01-03", "open": 470.1, "high": "472.0", "low": 468.2, "close": 469.0, "adjusted_close": 465.3, "volume": 1200},
            {"date": "2024-01-02", "close": "NA", "adjusted_close": null},
            {"close": 1.0}
        ]);

        let bars = parse_eod_bars(&body).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, None);
        assert_eq!(bars[1].high, Some(472.0));
        assert_eq!(bars[1].volume, Some(1200));
    }
}
