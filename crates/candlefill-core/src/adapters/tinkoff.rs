use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, Time, UtcOffset};
use tracing::debug;

use crate::data_source::{MarketDataSource, SourceError, SourceFuture};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{Bar, Currency, DateRange, Instrument, InstrumentType, Ticker};

pub const DEFAULT_BASE_URL: &str = "https://api-invest.tinkoff.ru/openapi/sandbox";
pub const TOKEN_ENV: &str = "CANDLEFILL_API_TOKEN";

/// Connection settings for the Tinkoff OpenAPI.
#[derive(Clone)]
pub struct TinkoffConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_ms: u64,
}

impl Default for TinkoffConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            token: std::env::var(TOKEN_ENV).unwrap_or_default(),
            timeout_ms: 5_000,
        }
    }
}

impl Debug for TinkoffConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TinkoffConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Tinkoff OpenAPI (REST v1) adapter.
#[derive(Clone)]
pub struct TinkoffAdapter {
    config: TinkoffConfig,
    auth: HttpAuth,
    http_client: Arc<dyn HttpClient>,
}

impl TinkoffAdapter {
    pub fn new(config: TinkoffConfig) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::default()))
    }

    pub fn with_http_client(config: TinkoffConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = HttpAuth::BearerToken(config.token.clone());
        Self {
            config,
            auth,
            http_client,
        }
    }

    pub fn config(&self) -> &TinkoffConfig {
        &self.config
    }

    fn endpoint(&self, path_and_query: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path_and_query
        )
    }

    async fn get_payload<T: DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        debug!(url = %url, "tinkoff request");
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_auth(&self.auth)
            .with_timeout_ms(self.config.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.timed_out() {
                SourceError::timeout(format!("tinkoff transport timeout: {}", error.message()))
            } else {
                SourceError::transport(format!("tinkoff transport error: {}", error.message()))
            }
        })?;

        match response.status {
            401 | 403 => {
                return Err(SourceError::unauthorized(format!(
                    "tinkoff rejected the token with status {}",
                    response.status
                )))
            }
            429 => {
                return Err(SourceError::rate_limited(
                    "tinkoff request rate exceeded (status 429)",
                ))
            }
            _ if !response.is_success() => {
                return Err(SourceError::upstream(format!(
                    "tinkoff upstream returned status {}: {}",
                    response.status,
                    upstream_message(&response.body)
                )))
            }
            _ => {}
        }

        let envelope: Envelope<T> = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::decode(format!("failed to parse tinkoff response: {e}")))?;
        Ok(envelope.payload)
    }
}

impl MarketDataSource for TinkoffAdapter {
    fn find_by_ticker<'a>(&'a self, ticker: &'a Ticker) -> SourceFuture<'a, Vec<Instrument>> {
        Box::pin(async move {
            let url = self.endpoint(&format!(
                "market/search/by-ticker?ticker={}",
                urlencoding::encode(ticker.as_str())
            ));
            let payload: InstrumentList = self.get_payload(url).await?;
            payload
                .instruments
                .into_iter()
                .filter(|instrument| instrument.ticker.eq_ignore_ascii_case(ticker.as_str()))
                .map(WireInstrument::into_instrument)
                .collect()
        })
    }

    fn daily_bars<'a>(&'a self, external_id: &'a str, range: DateRange) -> SourceFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            let (from, to) = request_bounds(range)?;
            let url = self.endpoint(&format!(
                "market/candles?figi={}&from={}&to={}&interval=day",
                urlencoding::encode(external_id),
                urlencoding::encode(&from),
                urlencoding::encode(&to)
            ));
            let payload: CandleList = self.get_payload(url).await?;

            let mut bars = Vec::with_capacity(payload.candles.len());
            for candle in payload.candles {
                let bar = candle.into_bar()?;
                if range.contains(bar.timestamp) {
                    bars.push(bar);
                }
            }
            Ok(bars)
        })
    }

    fn stocks<'a>(&'a self) -> SourceFuture<'a, Vec<Instrument>> {
        Box::pin(async move {
            let payload: InstrumentList = self.get_payload(self.endpoint("market/stocks")).await?;
            payload
                .instruments
                .into_iter()
                .map(WireInstrument::into_instrument)
                .collect()
        })
    }
}

/// RFC3339 bounds covering every day of `range`; the upper bound is exclusive.
fn request_bounds(range: DateRange) -> Result<(String, String), SourceError> {
    let from = range.from().midnight().assume_utc();
    let to = match range.to().next_day() {
        Some(next) => next.midnight().assume_utc(),
        None => range.to().with_time(Time::MAX).assume_utc(),
    };

    let format = |value: OffsetDateTime| {
        value
            .format(&Rfc3339)
            .map_err(|e| SourceError::invalid_request(format!("unformattable bound {value}: {e}")))
    };
    Ok((format(from)?, format(to)?))
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Envelope<ErrorPayload>>(body)
        .ok()
        .and_then(|envelope| envelope.payload.message)
        .unwrap_or_else(|| String::from("no error message"))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    payload: T,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentList {
    #[serde(default)]
    instruments: Vec<WireInstrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInstrument {
    figi: String,
    ticker: String,
    #[serde(default)]
    isin: String,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    min_price_increment: Option<Decimal>,
    lot: i64,
    currency: Currency,
    name: String,
    #[serde(rename = "type")]
    kind: InstrumentType,
}

impl WireInstrument {
    fn into_instrument(self) -> Result<Instrument, SourceError> {
        let ticker = Ticker::parse(&self.ticker)
            .map_err(|e| SourceError::decode(format!("tinkoff ticker '{}': {e}", self.ticker)))?;
        Ok(Instrument {
            storage_id: None,
            external_id: self.figi,
            ticker,
            isin: self.isin,
            name: self.name,
            min_price_increment: self.min_price_increment.unwrap_or(Decimal::ZERO),
            lot: self.lot,
            currency: self.currency,
            kind: self.kind,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CandleList {
    #[serde(default)]
    candles: Vec<WireCandle>,
}

#[derive(Debug, Deserialize)]
struct WireCandle {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    o: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    c: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    h: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    l: Decimal,
    v: i64,
    #[serde(with = "time::serde::rfc3339")]
    time: OffsetDateTime,
}

impl WireCandle {
    fn into_bar(self) -> Result<Bar, SourceError> {
        let day = self.time.to_offset(UtcOffset::UTC).date();
        Bar::new(self.o, self.c, self.h, self.l, self.v, day)
            .map_err(|e| SourceError::decode(format!("tinkoff candle at {day}: {e}")))
    }
}
