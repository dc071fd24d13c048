//! Built-in tools for the Scout agent

use anyhow::Result;
use async_trait::async_trait;
use scout_tools::{
    schema_of, CalculatorArgs, DuckDuckGoClient, InstantAnswer, OpenMeteoClient, SearchArgs,
    SearchError, WeatherArgs, WeatherError, WeatherReport,
};
use tracing::warn;

use crate::tool::Tool;

/// Web search tool backed by the DuckDuckGo Instant Answer API
pub struct WebSearchTool {
    client: DuckDuckGoClient,
}

impl WebSearchTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: DuckDuckGoClient::new()?,
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use this when you need up-to-date facts, \
         definitions or news."
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<SearchArgs>()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        search_output(input, self.client.search(input).await)
    }
}

/// Transport failures are errors; an upstream rejection is reported as text
fn search_output(query: &str, result: Result<InstantAnswer, SearchError>) -> Result<String> {
    match result {
        Ok(answer) => Ok(format!(
            "Search results for '{}': {}",
            query,
            answer.format_results()
        )),
        Err(SearchError::Api { status }) => {
            warn!("Search for '{}' returned HTTP {}", query, status);
            Ok(format!("Could not fetch results for '{}'", query))
        }
        Err(e) => Err(anyhow::anyhow!("Search failed: {}", e)),
    }
}

/// Current weather via Open-Meteo
pub struct WeatherTool {
    client: OpenMeteoClient,
}

impl WeatherTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: OpenMeteoClient::new()?,
        })
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city. Input is the city name, e.g. 'London'."
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<WeatherArgs>()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let city = input.trim();
        weather_output(city, self.client.current_weather(city).await)
    }
}

fn weather_output(city: &str, result: Result<WeatherReport, WeatherError>) -> Result<String> {
    match result {
        Ok(report) => Ok(report.format()),
        Err(e @ WeatherError::CityNotFound(_)) => Ok(e.to_string()),
        Err(WeatherError::GeocodingApi { .. }) => Ok("Error fetching weather data".to_string()),
        Err(WeatherError::ForecastApi { .. }) => Ok(format!("Could not fetch weather for {}", city)),
        Err(e) => Err(anyhow::anyhow!("Weather lookup failed: {}", e)),
    }
}

/// Arithmetic evaluator
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / // % ** and parentheses."
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<CalculatorArgs>()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let expression = input.trim();
        let value = scout_tools::evaluate(expression)
            .map_err(|e| anyhow::anyhow!("Could not evaluate '{}': {}", expression, e))?;
        Ok(format!("{} = {}", expression, scout_tools::format_number(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_tools::open_meteo::{CurrentConditions, Location};

    fn calculate(input: &str) -> Result<String> {
        tokio_test::block_on(CalculatorTool.invoke(input))
    }

    #[test]
    fn test_calculator() {
        assert_eq!(calculate("2 + 2").unwrap(), "2 + 2 = 4");
        assert_eq!(calculate(" 15 * 7 + 23 ").unwrap(), "15 * 7 + 23 = 128");
        assert_eq!(calculate("7 / 2").unwrap(), "7 / 2 = 3.5");
    }

    #[test]
    fn test_calculator_errors() {
        let err = calculate("1 / 0").unwrap_err();
        assert!(err.to_string().starts_with("Could not evaluate '1 / 0'"));
        assert!(calculate("__import__('os')").is_err());
    }

    #[test]
    fn test_schemas_name_the_input() {
        let calc = CalculatorTool;
        assert_eq!(calc.input_schema()["required"][0], "expression");
    }

    #[test]
    fn test_search_output() {
        let answer = InstantAnswer::default();
        assert_eq!(
            search_output("rust", Ok(answer)).unwrap(),
            "Search results for 'rust': No results found."
        );
        assert_eq!(
            search_output("rust", Err(SearchError::Api { status: 503 })).unwrap(),
            "Could not fetch results for 'rust'"
        );
    }

    #[test]
    fn test_weather_output() {
        assert_eq!(
            weather_output(
                "Atlantis",
                Err(WeatherError::CityNotFound("Atlantis".to_string()))
            )
            .unwrap(),
            "City 'Atlantis' not found"
        );
        assert_eq!(
            weather_output("Paris", Err(WeatherError::GeocodingApi { status: 500 })).unwrap(),
            "Error fetching weather data"
        );
        assert_eq!(
            weather_output("Paris", Err(WeatherError::ForecastApi { status: 502 })).unwrap(),
            "Could not fetch weather for Paris"
        );
    }

    #[test]
    fn test_weather_report_passthrough() {
        let report = WeatherReport::new(
            Location {
                name: "Mumbai".to_string(),
                latitude: 19.07,
                longitude: 72.88,
                country: Some("India".to_string()),
            },
            CurrentConditions {
                temperature_2m: Some(31.0),
                weather_code: Some(0),
                wind_speed_10m: Some(9.5),
            },
        );
        let text = weather_output("Mumbai", Ok(report)).unwrap();
        assert!(text.starts_with("Weather in Mumbai, India: Temperature: 31"));
    }
}
