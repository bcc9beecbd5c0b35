#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tower::ServiceExt;

use pricegrid_backend::app::create_app;
use pricegrid_backend::config::AppConfig;
use pricegrid_backend::external::mock::MockProvider;
use pricegrid_backend::external::price_provider::TickerProfile;
use pricegrid_backend::models::PricePoint;
use pricegrid_backend::state::AppState;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekdays from `start`, `count` of them.
pub fn weekdays(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut day = start;
    while days.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

/// Closes that drift within a percent or two each day.
pub fn series(days: &[NaiveDate], base: f64) -> Vec<PricePoint> {
    days.iter()
        .enumerate()
        .map(|(i, d)| {
            let wiggle = ((i * 7 % 11) as f64 - 5.0) / 500.0;
            PricePoint::new(*d, Some(base * (1.0 + wiggle)))
        })
        .collect()
}

pub fn apple_profile() -> TickerProfile {
    TickerProfile {
        name: Some("Apple Inc.".to_string()),
        currency: Some("USD".to_string()),
        average_volume: Some(52_000_000.0),
        fifty_day_average: Some(189.5),
        two_hundred_day_average: Some(180.25),
        market_cap: Some(2.9e12),
        beta: Some(1.25),
        next_earnings_date: Some(date(2024, 7, 30)),
    }
}

/// AAPL and MSFT trade every weekday of January 2024; MSFT skips the 10th.
pub fn market() -> MockProvider {
    let days = weekdays(date(2024, 1, 1), 23);
    let msft: Vec<PricePoint> = series(&days, 370.0)
        .into_iter()
        .filter(|p| p.date != date(2024, 1, 10))
        .collect();

    MockProvider::new()
        .with_bars("AAPL", series(&days, 185.0))
        .with_name("AAPL", "Apple Inc.")
        .with_bars("MSFT", msft)
        .with_name("MSFT", "Microsoft Corporation")
        .with_bars("SPY", series(&days, 470.0))
        .with_profile("AAPL", apple_profile())
}

pub fn app(provider: MockProvider) -> Router {
    create_app(AppState {
        price_provider: Arc::new(provider),
        config: Arc::new(AppConfig::default()),
    })
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

pub fn json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap()
}
