mod price_point;
pub mod panel;
pub mod beta;
pub mod scrape;

pub use price_point::PricePoint;
pub use panel::{AlignedPanel, HistoricalPricesResponse, TickerSeries};
pub use beta::{Basis, BetaResponse, BetaResult, BetaValue, Tenor};
pub use scrape::{MetricsSnapshot, NotComputed, ScrapeBatchRequest, ScrapeResult};
