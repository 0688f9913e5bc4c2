//! Pure symbol and market resolution.
//!
//! Maps an asset's ticker/class/country to a market segment, spells tickers
//! the way each provider expects, and recovers bond attributes from ticker
//! text. No I/O, no dependencies on the rest of the engine.

mod bond;
mod market;

pub use bond::{parse_bond, BondKind, BondProfile};
pub use market::{provider_symbol, resolve_market, Market};
