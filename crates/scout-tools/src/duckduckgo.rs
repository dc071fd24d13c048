//! DuckDuckGo Instant Answer API client
//!
//! Keyless web lookup returning abstracts, direct answers, definitions and
//! related topics for a query.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DDG_API_BASE: &str = "https://api.duckduckgo.com/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Maximum related topics included in formatted output
const MAX_RELATED_TOPICS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status}")]
    Api { status: u16 },
}

#[derive(Clone, Debug)]
pub struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new() -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Look up a query
    pub async fn search(&self, query: &str) -> Result<InstantAnswer, SearchError> {
        debug!("DuckDuckGo lookup: {}", query);

        let response = self
            .client
            .get(DDG_API_BASE)
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    pub heading: String,
    #[serde(rename = "AbstractText", default)]
    pub abstract_text: String,
    #[serde(rename = "AbstractSource", default)]
    pub abstract_source: String,
    #[serde(rename = "AbstractURL", default)]
    pub abstract_url: String,
    /// Usually a string, but some answer types return structured data
    #[serde(rename = "Answer", default)]
    pub answer: serde_json::Value,
    #[serde(rename = "Definition", default)]
    pub definition: String,
    #[serde(rename = "DefinitionSource", default)]
    pub definition_source: String,
    #[serde(rename = "RelatedTopics", default)]
    pub related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedTopic {
    #[serde(rename = "Text")]
    pub text: Option<String>,
    #[serde(rename = "FirstURL")]
    pub first_url: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Topics", default)]
    pub topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    /// Related topics with group entries flattened
    fn flat_topics(&self) -> Vec<&RelatedTopic> {
        let mut out = Vec::new();
        for topic in &self.related_topics {
            if topic.topics.is_empty() {
                out.push(topic);
            } else {
                out.extend(topic.topics.iter());
            }
        }
        out.retain(|t| t.text.as_deref().is_some_and(|s| !s.is_empty()));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.abstract_text.is_empty()
            && self.answer_text().is_none()
            && self.definition.is_empty()
            && self.flat_topics().is_empty()
    }

    fn answer_text(&self) -> Option<String> {
        match &self.answer {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Format results as text for the model
    pub fn format_results(&self) -> String {
        let mut output = String::new();

        if let Some(answer) = self.answer_text() {
            output.push_str(&format!("**Answer:** {}\n\n", answer));
        }

        if !self.abstract_text.is_empty() {
            if !self.heading.is_empty() {
                output.push_str(&format!("**{}**\n", self.heading));
            }
            output.push_str(&format!("{}\n", self.abstract_text));
            if !self.abstract_url.is_empty() {
                let source = if self.abstract_source.is_empty() {
                    "Source"
                } else {
                    self.abstract_source.as_str()
                };
                output.push_str(&format!("{}: {}\n", source, self.abstract_url));
            }
            output.push('\n');
        }

        if !self.definition.is_empty() {
            output.push_str(&format!("**Definition:** {}", self.definition));
            if !self.definition_source.is_empty() {
                output.push_str(&format!(" ({})", self.definition_source));
            }
            output.push_str("\n\n");
        }

        let topics = self.flat_topics();
        if !topics.is_empty() {
            output.push_str("**Related:**\n\n");
            for (i, topic) in topics.iter().take(MAX_RELATED_TOPICS).enumerate() {
                output.push_str(&format!(
                    "{}. {}\n",
                    i + 1,
                    topic.text.as_deref().unwrap_or("")
                ));
                if let Some(url) = topic.first_url.as_deref() {
                    output.push_str(&format!("   URL: {}\n", url));
                }
            }
        }

        if output.is_empty() {
            "No results found.".to_string()
        } else {
            output.trim_end().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUST_FIXTURE: &str = r#"{
        "Heading": "Rust (programming language)",
        "AbstractText": "Rust is a general-purpose programming language.",
        "AbstractSource": "Wikipedia",
        "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        "Answer": "",
        "Definition": "",
        "RelatedTopics": [
            {"Text": "Cargo - the Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
            {"Name": "See also", "Topics": [
                {"Text": "Ferris - the Rust mascot", "FirstURL": "https://duckduckgo.com/Ferris"},
                {"Text": "", "FirstURL": "https://duckduckgo.com/Empty"}
            ]}
        ]
    }"#;

    #[test]
    fn test_format_abstract_and_topics() {
        let answer: InstantAnswer = serde_json::from_str(RUST_FIXTURE).unwrap();
        assert!(!answer.is_empty());

        let text = answer.format_results();
        assert!(text.starts_with("**Rust (programming language)**"));
        assert!(text.contains("Wikipedia: https://en.wikipedia.org/wiki/Rust_(programming_language)"));
        assert!(text.contains("1. Cargo - the Rust package manager"));
        assert!(text.contains("2. Ferris - the Rust mascot"));
        assert!(!text.contains("Empty"));
        assert!(!text.contains("**Answer:**"));
    }

    #[test]
    fn test_structured_answer_is_skipped() {
        let answer: InstantAnswer =
            serde_json::from_str(r#"{"Answer": {"from": "calculator"}, "Definition": "a thing"}"#)
                .unwrap();
        let text = answer.format_results();
        assert_eq!(text, "**Definition:** a thing");
    }

    #[test]
    fn test_numeric_answer() {
        let answer: InstantAnswer = serde_json::from_str(r#"{"Answer": 42}"#).unwrap();
        assert_eq!(answer.format_results(), "**Answer:** 42");
    }

    #[test]
    fn test_empty_response() {
        let answer: InstantAnswer = serde_json::from_str("{}").unwrap();
        assert!(answer.is_empty());
        assert_eq!(answer.format_results(), "No results found.");
    }
}
