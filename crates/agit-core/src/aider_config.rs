use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// A config key aider accepts either as one string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// The parts of an aider YAML config this service reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AiderConfig {
    #[serde(default)]
    pub alias: StringOrList,
    #[serde(default)]
    pub read: StringOrList,
    pub model_settings_file: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl AiderConfig {
    pub fn parse(path: &str, text: &str) -> Result<Self, ConfigError> {
        if is_blank_yaml(text) {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|err| ConfigError::Parse {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    pub fn aliases(&self) -> Vec<String> {
        self.alias.clone().into_vec()
    }

    pub fn read_files(&self) -> Vec<String> {
        self.read.clone().into_vec()
    }

    /// Model behind `<name>:<model>` in the alias list.
    pub fn model_for(&self, name: &str) -> Option<String> {
        self.aliases().into_iter().find_map(|entry| {
            let (alias, model) = entry.split_once(':')?;
            (alias.trim() == name).then(|| model.trim().to_string())
        })
    }
}

/// Per-assistant overlay written under the assistants directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssistantOverlay {
    pub alias: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
}

impl AssistantOverlay {
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse {
            path: "assistant overlay".to_string(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// One record of the shared model-settings registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_temperature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<ExtraParams>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ModelSettings {
    pub fn new(name: &str, temperature: Option<f64>, top_p: Option<f64>) -> Self {
        let extra_params = (temperature.is_some() || top_p.is_some()).then(|| ExtraParams {
            temperature,
            top_p,
            other: BTreeMap::new(),
        });
        Self {
            name: name.to_string(),
            use_temperature: temperature.map(|_| Value::Bool(true)),
            extra_params,
            other: BTreeMap::new(),
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        self.extra_params.as_ref().and_then(|extra| extra.temperature)
    }

    pub fn top_p(&self) -> Option<f64> {
        self.extra_params.as_ref().and_then(|extra| extra.top_p)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSettingsRegistry {
    entries: Vec<ModelSettings>,
}

impl ModelSettingsRegistry {
    pub fn parse(path: &str, text: &str) -> Result<Self, ConfigError> {
        if is_blank_yaml(text) {
            return Ok(Self::default());
        }
        let entries: Option<Vec<ModelSettings>> =
            serde_yaml::from_str(text).map_err(|err| ConfigError::Parse {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&ModelSettings> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn push(&mut self, entry: ModelSettings) {
        self.entries.push(entry);
    }

    /// Drops every record named `name`; returns whether any was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        before != self.entries.len()
    }

    pub fn entries(&self) -> &[ModelSettings] {
        &self.entries
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.entries).map_err(|err| ConfigError::Parse {
            path: "model settings".to_string(),
            message: err.to_string(),
        })
    }
}

fn is_blank_yaml(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_and_read_accept_string_or_list() {
        let single = AiderConfig::parse("base", "alias: fast:gpt-4o-mini\nread: CONVENTIONS.md\n")
            .unwrap();
        assert_eq!(single.aliases(), vec!["fast:gpt-4o-mini".to_string()]);
        assert_eq!(single.read_files(), vec!["CONVENTIONS.md".to_string()]);

        let many = AiderConfig::parse(
            "base",
            "alias:\n  - a:m1\n  - b:m2\nmodel-settings-file: custom.yml\nauto-commits: false\n",
        )
        .unwrap();
        assert_eq!(many.aliases().len(), 2);
        assert_eq!(many.model_for("b").as_deref(), Some("m2"));
        assert_eq!(many.model_settings_file.as_deref(), Some("custom.yml"));
        assert!(many.other.contains_key("auto-commits"));
    }

    #[test]
    fn blank_config_is_default() {
        assert_eq!(AiderConfig::parse("base", "").unwrap(), AiderConfig::default());
        assert_eq!(
            AiderConfig::parse("base", "# only comments\n").unwrap(),
            AiderConfig::default()
        );
    }

    #[test]
    fn registry_record_with_temperature() {
        let mut registry = ModelSettingsRegistry::default();
        registry.push(ModelSettings::new("reviewer", Some(0.2), None));
        let yaml = registry.to_yaml().unwrap();

        let reparsed = ModelSettingsRegistry::parse("registry", &yaml).unwrap();
        let entry = reparsed.get("reviewer").unwrap();
        assert_eq!(entry.use_temperature, Some(Value::Bool(true)));
        assert_eq!(entry.temperature(), Some(0.2));
        assert_eq!(entry.top_p(), None);
        assert!(!yaml.contains("top_p"));
    }

    #[test]
    fn registry_record_without_params_is_bare() {
        let entry = ModelSettings::new("plain", None, None);
        let yaml = serde_yaml::to_string(&entry).unwrap();
        assert_eq!(yaml.trim(), "name: plain");
    }

    #[test]
    fn registry_preserves_unknown_keys() {
        let text = "- name: gpt-4o\n  edit_format: diff\n  extra_params:\n    max_tokens: 100\n";
        let mut registry = ModelSettingsRegistry::parse("registry", text).unwrap();
        registry.push(ModelSettings::new("new_one", None, Some(0.9)));
        let yaml = registry.to_yaml().unwrap();

        assert!(yaml.contains("edit_format: diff"));
        assert!(yaml.contains("max_tokens: 100"));
        assert!(yaml.contains("top_p: 0.9"));
        assert!(registry.remove("gpt-4o"));
        assert!(!registry.contains("gpt-4o"));
        assert!(!registry.remove("gpt-4o"));
    }

    #[test]
    fn overlay_serializes_read_only_when_present() {
        let overlay = AssistantOverlay {
            alias: vec!["reviewer:gpt-4o".to_string()],
            read: Vec::new(),
        };
        let yaml = overlay.to_yaml().unwrap();
        assert!(yaml.contains("reviewer:gpt-4o"));
        assert!(!yaml.contains("read"));
    }
}
