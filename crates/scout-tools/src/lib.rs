//! Scout Tools - external capabilities the agent can call
//!
//! Tools are organized by category:
//! - duckduckgo: DuckDuckGo Instant Answer API client
//! - open_meteo: Open-Meteo geocoding + forecast client
//! - calculator: sandboxed arithmetic evaluator
//! - schema: JSON Schemas for tool inputs

pub mod calculator;
pub mod duckduckgo;
pub mod open_meteo;
pub mod schema;

pub use calculator::{evaluate, format_number, CalcError};
pub use duckduckgo::{DuckDuckGoClient, InstantAnswer, SearchError};
pub use open_meteo::{OpenMeteoClient, WeatherError, WeatherReport};
pub use schema::{schema_of, CalculatorArgs, SearchArgs, WeatherArgs};
