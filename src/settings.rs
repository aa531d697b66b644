use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    #[serde(default = "RendererSettings::default_animation_interval_ms")]
    pub animation_interval_ms: u64,
    #[serde(default = "RendererSettings::default_initial_instance_capacity")]
    pub initial_instance_capacity: usize,
    #[serde(default = "RendererSettings::default_highlight_color")]
    pub highlight_color: [f32; 4],
    #[serde(default = "RendererSettings::default_default_color")]
    pub default_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            animation_interval_ms: Self::default_animation_interval_ms(),
            initial_instance_capacity: Self::default_initial_instance_capacity(),
            highlight_color: Self::default_highlight_color(),
            default_color: Self::default_default_color(),
        }
    }
}

impl RendererSettings {
    pub fn load() -> Self {
        Self::load_from_path("renderer.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RendererSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded renderer settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default renderer settings.",
                        path, err
                    );
                    RendererSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Renderer settings file {:?} not found. Using default settings.",
                    path
                );
                RendererSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default renderer settings.",
                    path, err
                );
                RendererSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.animation_interval_ms == 0 {
            warn!("Animation interval must be greater than zero. Using default value.");
            self.animation_interval_ms = Self::default_animation_interval_ms();
        }

        if self.initial_instance_capacity == 0 {
            warn!("Initial instance capacity must be greater than zero. Using default value.");
            self.initial_instance_capacity = Self::default_initial_instance_capacity();
        }

        if !self.highlight_color.iter().all(|c| c.is_finite()) {
            warn!("Highlight color must be finite. Using default color.");
            self.highlight_color = Self::default_highlight_color();
        }

        if !self.default_color.iter().all(|c| c.is_finite()) {
            warn!("Default color must be finite. Using default color.");
            self.default_color = Self::default_default_color();
        }

        self
    }

    pub fn animation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.animation_interval_ms)
    }

    const fn default_animation_interval_ms() -> u64 {
        16
    }

    const fn default_initial_instance_capacity() -> usize {
        64
    }

    const fn default_highlight_color() -> [f32; 4] {
        [2.0, 2.0, 2.0, 1.0]
    }

    const fn default_default_color() -> [f32; 4] {
        [1.0; 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RendererSettings {
        RendererSettings {
            animation_interval_ms: 0,
            initial_instance_capacity: 0,
            highlight_color: [f32::NAN, 1.0, 1.0, 1.0],
            default_color: [1.0, f32::INFINITY, 1.0, 1.0],
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RendererSettings::default();

        assert_eq!(validated.animation_interval_ms, defaults.animation_interval_ms);
        assert_eq!(
            validated.initial_instance_capacity,
            defaults.initial_instance_capacity
        );
        assert_eq!(validated.highlight_color, defaults.highlight_color);
        assert_eq!(validated.default_color, defaults.default_color);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RendererSettings {
            animation_interval_ms: 33,
            initial_instance_capacity: 8,
            highlight_color: [1.0, 0.0, 0.0, 1.0],
            default_color: [0.5, 0.5, 0.5, 1.0],
        };

        assert_eq!(valid.clone().validate(), valid);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let parsed: RendererSettings =
            serde_json::from_str(r#"{ "animation_interval_ms": 40 }"#).unwrap();
        assert_eq!(parsed.animation_interval_ms, 40);
        assert_eq!(parsed.initial_instance_capacity, 64);
        assert_eq!(parsed.highlight_color, [2.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RendererSettings::load_from_path("does/not/exist/renderer.json");
        assert_eq!(settings, RendererSettings::default());
    }

    #[test]
    fn file_on_disk_is_loaded_and_validated() {
        let path = std::env::temp_dir().join(format!(
            "m2-batch-settings-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "animation_interval_ms": 0, "initial_instance_capacity": 4 }"#)
            .unwrap();

        let settings = RendererSettings::load_from_path(&path);
        let _ = std::fs::remove_file(&path);

        assert_eq!(settings.animation_interval_ms, 16);
        assert_eq!(settings.initial_instance_capacity, 4);
    }
}
