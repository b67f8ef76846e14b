pub mod candle;
pub mod market_key;
pub mod timeframe;

pub use candle::Candle;
pub use market_key::MarketKey;
pub use timeframe::Timeframe;
