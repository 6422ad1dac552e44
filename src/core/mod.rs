//! Core conversion logic and abstractions

pub mod config;
pub mod controller;
pub mod convert;
pub mod currency;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use controller::{ControllerSettings, ConversionController, ConversionState};
pub use currency::Currency;
pub use rates::{ExchangeRateSnapshot, FetchError, RateFetcher};
