use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

use crate::config::SynthConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// Loads the layered configuration: embedded defaults, then `synth.toml` and
/// `synth.local.toml` in the working directory, then `extra_path`.
pub fn load_config(extra_path: Option<&Path>) -> Result<SynthConfig> {
    let mut ordered_paths = vec![
        PathBuf::from("synth.toml"),
        PathBuf::from("synth.local.toml"),
    ];

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut layers = Vec::new();
    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            layers.push((path.display().to_string(), content));
        }
    }
    config_from_layers(&layers)
}

/// Merges TOML documents over the embedded defaults, later layers winning.
pub fn config_from_layers(layers: &[(String, String)]) -> Result<SynthConfig> {
    let mut merged: Value = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse embedded default settings")?;
    for (name, content) in layers {
        let layer: Value =
            toml::from_str(content).with_context(|| format!("failed to parse settings: {}", name))?;
        merge_value(&mut merged, layer);
    }
    let config: SynthConfig = merged
        .try_into()
        .with_context(|| "settings do not match the expected schema")?;
    config.validate()?;
    Ok(config)
}

pub fn default_settings_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

fn merge_value(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Table(base), Value::Table(incoming)) => {
            for (key, value) in incoming {
                match base.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneratorKind, MissingGlyphPolicy};

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let config = config_from_layers(&[]).expect("defaults");
        assert_eq!(config, SynthConfig::default());
    }

    #[test]
    fn later_layers_override_nested_keys_only() {
        let layers = vec![
            (
                "base".to_string(),
                "[generation]\ngenerator = \"chinese\"\n[augment.noise]\nprobability = 0.0\n"
                    .to_string(),
            ),
            (
                "local".to_string(),
                "[layout]\nmissing_glyph_policy = \"drop\"\n[layout.separator_multipliers]\n\"-\" = 3.0\n"
                    .to_string(),
            ),
        ];
        let config = config_from_layers(&layers).expect("merged");
        assert_eq!(config.generation.generator, GeneratorKind::Chinese);
        assert_eq!(config.augment.noise.probability, 0.0);
        assert_eq!(config.augment.noise.stddev, [2.0, 8.0]);
        assert_eq!(config.layout.missing_glyph_policy, MissingGlyphPolicy::Drop);
        assert_eq!(config.layout.separator_multiplier_for('-'), 3.0);
        assert_eq!(config.layout.line_height, 64);
    }

    #[test]
    fn invalid_values_fail_fast() {
        let layers = vec![(
            "bad".to_string(),
            "[augment.blur]\nprobability = 2.0\n".to_string(),
        )];
        let err = config_from_layers(&layers).unwrap_err();
        assert!(format!("{:#}", err).contains("augment.blur.probability"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let layers = vec![("typo".to_string(), "[layout]\nline_hieght = 3\n".to_string())];
        assert!(config_from_layers(&layers).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
