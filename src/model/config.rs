use std::{fs, path::Path};

use serde_yaml::Value;

use crate::error::Result;

/// Model type assumed when a config declares none.
pub const DEFAULT_MODEL_TYPE: &str = "bandit";

/// The parts of a separation model's YAML config the pipeline reads.
///
/// Two schema generations exist. Newer configs keep everything under
/// `training` (`training.instruments`, `training.model_type`); older ones
/// use `model.stems` and a top-level `model_type`. The newer shape wins
/// when both are present.
#[derive(Clone, Debug)]
pub struct BundleConfig {
    root: Value,
}

impl BundleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(text)?;
        Ok(Self { root })
    }

    pub fn stems(&self) -> Vec<String> {
        let newer = self.root.get("training").and_then(|t| t.get("instruments"));
        let legacy = self.root.get("model").and_then(|m| m.get("stems"));

        newer
            .or(legacy)
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().filter_map(scalar_to_string).collect())
            .unwrap_or_default()
    }

    pub fn model_type(&self) -> String {
        self.root
            .get("training")
            .and_then(|t| t.get("model_type"))
            .or_else(|| self.root.get("model_type"))
            .and_then(scalar_to_string)
            .unwrap_or_else(|| DEFAULT_MODEL_TYPE.to_string())
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
