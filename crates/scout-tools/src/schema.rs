//! Input schemas advertised to the model for each tool

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Deserialize, JsonSchema)]
pub struct SearchArgs {
    #[schemars(description = "The search query to look up on the web")]
    pub query: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct WeatherArgs {
    #[schemars(description = "Name of the city to get the current weather for")]
    pub city: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct CalculatorArgs {
    #[schemars(description = "Arithmetic expression, e.g. '25 * 4 + 100'")]
    pub expression: String,
}

/// JSON Schema for `T` as a plain JSON value
pub fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null)
}
