use crate::analyzer::AnalyzerConfig;
use serde::{Deserialize, Serialize};

/// Names of the fields produced by the document sources and targeted by
/// structured search requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub title: String,
    pub description: String,
    pub date: String,
    pub content: String,
    pub path: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            title: "title".into(),
            description: "description".into(),
            date: "pubDate".into(),
            content: "content".into(),
            path: "path".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fields: FieldNames,
    pub analyzer: AnalyzerConfig,
    /// Result count used when a caller does not ask for one.
    pub default_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { fields: FieldNames::default(), analyzer: AnalyzerConfig::default(), default_k: 5 }
    }
}

impl EngineConfig {
    pub fn from_json(s: &str) -> crate::Result<Self> { Ok(serde_json::from_str(s)?) }
}
