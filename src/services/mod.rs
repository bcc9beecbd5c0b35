pub mod alignment_service;
pub mod beta_service;
pub mod scrape_service;
