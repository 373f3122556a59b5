//! Yahoo Finance quote source.
//!
//! Reads the latest close from Yahoo's v8 chart API. Tries the intraday
//! window first (1 day of 1-minute bars) and falls back to the daily window
//! (5 days of daily bars) when the market is closed or intraday data is empty.
//! Handles rate limiting, retries with exponential backoff, and the circuit
//! breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{PriceSource, QuoteError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// (range, interval) pairs, tried in order.
const WINDOWS: [(&str, &str); 2] = [("1d", "1m"), ("5d", "1d")];

/// Ceiling for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `MAX_BACKOFF`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub struct YahooQuotes {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooQuotes {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, QuoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| QuoteError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, range: &str, interval: &str) -> String {
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?range={range}&interval={interval}"
        )
    }

    /// Last finite, positive close in the response.
    ///
    /// `Ok(None)` means the window came back well-formed but empty.
    fn parse_latest_close(symbol: &str, resp: ChartResponse) -> Result<Option<f64>, QuoteError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => QuoteError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                QuoteError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => QuoteError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| QuoteError::ResponseFormatChanged("result array is empty".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| QuoteError::ResponseFormatChanged("no quote data".into()))?;

        Ok(quote
            .close
            .into_iter()
            .rev()
            .flatten()
            .find(|c| c.is_finite() && *c > 0.0))
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Option<f64>, QuoteError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(QuoteError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, range, interval);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                log::debug!("retrying {symbol} quote in {delay:?} (attempt {attempt})");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(QuoteError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(QuoteError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(QuoteError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(QuoteError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(QuoteError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        QuoteError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let close = Self::parse_latest_close(symbol, chart)?;
                    self.circuit_breaker.record_success();
                    return Ok(close);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(QuoteError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(QuoteError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| QuoteError::Other("max retries exceeded".into())))
    }
}

impl PriceSource for YahooQuotes {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError> {
        for (range, interval) in WINDOWS {
            if let Some(price) = self.fetch_with_retry(symbol, range, interval)? {
                log::debug!("{symbol} quote {price:.4} from {range}/{interval} window");
                return Ok(price);
            }
        }
        Err(QuoteError::NoRecentPrice {
            symbol: symbol.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Option<f64>, QuoteError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooQuotes::parse_latest_close("TEST", resp)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn takes_last_non_null_close() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[
            {"close":[101.0, 102.5, null, null]}
        ]}}],"error":null}}"#;
        assert_eq!(parse(json).unwrap(), Some(102.5));
    }

    #[test]
    fn all_null_closes_is_empty_window() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[
            {"close":[null, null]}
        ]}}],"error":null}}"#;
        assert_eq!(parse(json).unwrap(), None);
    }

    #[test]
    fn missing_close_array_is_empty_window() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert_eq!(parse(json).unwrap(), None);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{
            "code":"Not Found","description":"No data found, symbol may be delisted"
        }}}"#;
        assert!(matches!(
            parse(json),
            Err(QuoteError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn empty_result_is_format_change() {
        let json = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(
            parse(json),
            Err(QuoteError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn url_carries_range_and_interval() {
        let url = YahooQuotes::chart_url("BTC-USD", "5d", "1d");
        assert!(url.ends_with("/BTC-USD?range=5d&interval=1d"));
    }
}
