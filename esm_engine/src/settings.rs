use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown model setting `{0}`")]
    UnknownKey(String),
    #[error("model setting `{0}` must not be empty")]
    EmptyValue(String),
}

/// Skeleton and animation model paths used when assembling actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub baseanim: String,
    pub baseanimkna: String,
    pub baseanimfemale: String,
    pub wolfskin: String,
    pub xbaseanim: String,
    pub xbaseanimkna: String,
    pub xbaseanimfemale: String,
    pub xbaseanim1st: String,
    pub baseanimkna1st: String,
    pub baseanimfemale1st: String,
    pub wolfskin1st: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            baseanim: "meshes/base_anim.nif".to_string(),
            baseanimkna: "meshes/base_animkna.nif".to_string(),
            baseanimfemale: "meshes/base_anim_female.nif".to_string(),
            wolfskin: "meshes/wolf/skin.nif".to_string(),
            xbaseanim: "meshes/xbase_anim.nif".to_string(),
            xbaseanimkna: "meshes/xbase_animkna.nif".to_string(),
            xbaseanimfemale: "meshes/xbase_anim_female.nif".to_string(),
            xbaseanim1st: "meshes/xbase_anim.1st.nif".to_string(),
            baseanimkna1st: "meshes/base_animkna.1st.nif".to_string(),
            baseanimfemale1st: "meshes/base_anim_female.1st.nif".to_string(),
            wolfskin1st: "meshes/wolf/skin.1st.nif".to_string(),
        }
    }
}

impl ModelSettings {
    pub const KEYS: [&'static str; 11] = [
        "baseanim",
        "baseanimkna",
        "baseanimfemale",
        "wolfskin",
        "xbaseanim",
        "xbaseanimkna",
        "xbaseanimfemale",
        "xbaseanim1st",
        "baseanimkna1st",
        "baseanimfemale1st",
        "wolfskin1st",
    ];

    fn slot(&self, key: &str) -> Option<&String> {
        let value = match key {
            "baseanim" => &self.baseanim,
            "baseanimkna" => &self.baseanimkna,
            "baseanimfemale" => &self.baseanimfemale,
            "wolfskin" => &self.wolfskin,
            "xbaseanim" => &self.xbaseanim,
            "xbaseanimkna" => &self.xbaseanimkna,
            "xbaseanimfemale" => &self.xbaseanimfemale,
            "xbaseanim1st" => &self.xbaseanim1st,
            "baseanimkna1st" => &self.baseanimkna1st,
            "baseanimfemale1st" => &self.baseanimfemale1st,
            "wolfskin1st" => &self.wolfskin1st,
            _ => return None,
        };
        Some(value)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        let value = match key {
            "baseanim" => &mut self.baseanim,
            "baseanimkna" => &mut self.baseanimkna,
            "baseanimfemale" => &mut self.baseanimfemale,
            "wolfskin" => &mut self.wolfskin,
            "xbaseanim" => &mut self.xbaseanim,
            "xbaseanimkna" => &mut self.xbaseanimkna,
            "xbaseanimfemale" => &mut self.xbaseanimfemale,
            "xbaseanim1st" => &mut self.xbaseanim1st,
            "baseanimkna1st" => &mut self.baseanimkna1st,
            "baseanimfemale1st" => &mut self.baseanimfemale1st,
            "wolfskin1st" => &mut self.wolfskin1st,
            _ => return None,
        };
        Some(value)
    }

    pub fn get(&self, key: &str) -> Result<&str, SettingsError> {
        self.slot(key)
            .map(String::as_str)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), SettingsError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SettingsError::EmptyValue(key.to_string()));
        }
        let slot = self
            .slot_mut(key)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        *slot = value;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models: ModelSettings,
}

impl Settings {
    /// Reads settings from a JSON file. A missing path or file yields the
    /// defaults; keys absent from the file keep their default values.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        if !path.exists() {
            log::warn!("settings file {} not found; using defaults", path.display());
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings json: {}", path.display()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_json_overrides_single_keys() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "models": {{ "wolfskin": "meshes/custom/wolf.nif" }} }}"#
        )
        .unwrap();
        let settings = Settings::from_json_file(Some(file.path())).unwrap();
        assert_eq!(settings.models.wolfskin, "meshes/custom/wolf.nif");
        assert_eq!(settings.models.baseanim, "meshes/base_anim.nif");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = Settings::from_json_file(Some(Path::new("/nonexistent/models.json")));
        assert_eq!(settings.unwrap(), Settings::default());
        assert_eq!(Settings::from_json_file(None).unwrap(), Settings::default());
    }

    #[test]
    fn malformed_json_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Settings::from_json_file(Some(file.path())).unwrap_err();
        assert!(format!("{err}").contains("failed to parse settings json"));
    }

    #[test]
    fn keys_are_addressable_by_name() {
        let mut models = ModelSettings::default();
        for key in ModelSettings::KEYS {
            assert!(models.get(key).is_ok(), "{key} should resolve");
        }
        models.set("baseanim", "meshes/other.nif").unwrap();
        assert_eq!(models.get("baseanim"), Ok("meshes/other.nif"));
        assert_eq!(
            models.get("nope"),
            Err(SettingsError::UnknownKey("nope".to_string()))
        );
        assert_eq!(
            models.set("wolfskin", ""),
            Err(SettingsError::EmptyValue("wolfskin".to_string()))
        );
    }
}
