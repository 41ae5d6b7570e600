//! Cassette data structures for recording and replaying interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded interaction with an external port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (e.g. "llm", "issues", "clock").
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Input data sent to the port.
    pub input: serde_json::Value,
    /// Output data returned from the port.
    pub output: serde_json::Value,
}

/// A cassette containing a sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Tool version that produced the recording.
    pub version: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Parses a cassette from YAML.
    ///
    /// # Errors
    ///
    /// Returns a message naming `origin` if the YAML does not describe a cassette.
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse cassette {origin}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_output_survives_yaml() {
        let cassette = Cassette {
            name: "generate-requirements".into(),
            recorded_at: Utc::now(),
            version: "0.1.0".into(),
            interactions: vec![Interaction {
                seq: 0,
                port: "llm".into(),
                method: "stream_completion".into(),
                input: json!({"model": "m", "prompt": "Build a todo app"}),
                output: json!({
                    "chunks": ["# Requirements\n", "- story: \"quoted\"\n"],
                    "result": {"Ok": {"prompt_tokens": 10, "completion_tokens": 4, "stop_reason": "end_turn"}},
                }),
            }],
        };
        let yaml = serde_yaml::to_string(&cassette).expect("serialize");
        let parsed = Cassette::from_yaml(&yaml, "inline").expect("deserialize");
        assert_eq!(cassette, parsed);
    }

    #[test]
    fn malformed_yaml_names_its_origin() {
        let err = Cassette::from_yaml("interactions: [", "broken.yaml").unwrap_err();
        assert!(err.contains("broken.yaml"));
    }
}
