//! Domain types: price samples, strategy parameters, positions.

pub mod params;
pub mod position;
pub mod price;

pub use params::{stagnation_index, ParamError, StrategyParams};
pub use position::{Exit, Position, Settlement};
pub use price::{cents_to_unit, PricePoint, PriceSeries};
