pub mod mock;
pub mod price_provider;
pub mod retrying_provider;
pub mod yahoofinance;
