pub mod binance;
pub mod mock;

pub use binance::BinanceMarketDataService;
pub use mock::MockMarketDataService;
