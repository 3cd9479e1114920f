//! Engine configuration
//!
//! Loaded from TOML at startup or assembled in code through the `with_*`
//! builders. Everything here is validated once before the renderer is
//! created; nothing revalidates at frame time.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field held a value outside its accepted range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A vertex/fragment shader pair, by path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShaderPaths {
    /// Vertex stage
    pub vert: String,
    /// Fragment stage
    pub frag: String,
}

impl ShaderPaths {
    /// Build a pair from two paths
    pub fn new(vert: impl Into<String>, frag: impl Into<String>) -> Self {
        Self {
            vert: vert.into(),
            frag: frag.into(),
        }
    }
}

/// One post-process effect declaration
#[derive(Debug, Clone, Deserialize)]
pub struct PostEffectConfig {
    /// Effect name, used in logs and pass labels
    pub name: String,
    /// Full-screen shader pair
    pub shader: ShaderPaths,
}

/// Renderer tunables fixed for the process lifetime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// How many frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Shadow map side length in pixels
    pub shadow_map_size: u32,
    /// Depth-only shadow shader
    pub shadow_shader: ShaderPaths,
    /// Full-screen lighting resolve shader
    pub lighting_shader: ShaderPaths,
    /// Ordered post-process chain; empty means the lighting pass writes
    /// the swap-chain image directly
    pub post_effects: Vec<PostEffectConfig>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            shadow_map_size: 2048,
            shadow_shader: ShaderPaths::new("shaders/shadow.vert.spv", "shaders/shadow.frag.spv"),
            lighting_shader: ShaderPaths::new(
                "shaders/lighting.vert.spv",
                "shaders/lighting.frag.spv",
            ),
            post_effects: Vec::new(),
        }
    }
}

impl RendererConfig {
    /// Start from defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frames-in-flight bound
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set the shadow map side length
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// Set the shadow shader pair
    pub fn with_shadow_shader(mut self, shader: ShaderPaths) -> Self {
        self.shadow_shader = shader;
        self
    }

    /// Set the lighting shader pair
    pub fn with_lighting_shader(mut self, shader: ShaderPaths) -> Self {
        self.lighting_shader = shader;
        self
    }

    /// Append a post effect to the chain
    pub fn with_post_effect(mut self, name: impl Into<String>, shader: ShaderPaths) -> Self {
        self.post_effects.push(PostEffectConfig {
            name: name.into(),
            shader,
        });
        self
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=8).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "max_frames_in_flight must be 1..=8, got {}",
                self.max_frames_in_flight
            )));
        }
        if self.shadow_map_size == 0 || self.shadow_map_size > 16384 {
            return Err(ConfigError::Invalid(format!(
                "shadow_map_size must be 1..=16384, got {}",
                self.shadow_map_size
            )));
        }
        for effect in &self.post_effects {
            if effect.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "post effect name must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter applied when the host does not set `RUST_LOG`
    pub log_level: Option<String>,
    /// Renderer section
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.renderer.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(RendererConfig::new()
            .with_max_frames_in_flight(0)
            .validate()
            .is_err());
        assert!(RendererConfig::new()
            .with_max_frames_in_flight(9)
            .validate()
            .is_err());
        assert!(RendererConfig::new()
            .with_max_frames_in_flight(3)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::from_toml_str(
            r#"
            log_level = "debug"

            [renderer]
            max_frames_in_flight = 3
            shadow_map_size = 1024

            [[renderer.post_effects]]
            name = "tonemap"
            shader = { vert = "shaders/fs.vert.spv", frag = "shaders/tonemap.frag.spv" }
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert_eq!(config.renderer.shadow_map_size, 1024);
        assert_eq!(config.renderer.post_effects.len(), 1);
        assert_eq!(config.renderer.post_effects[0].name, "tonemap");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(EngineConfig::from_toml_str("renderer = 3").is_err());
        assert!(EngineConfig::from_toml_str(
            r#"
            [renderer]
            max_frames_in_flight = 0
            "#,
        )
        .is_err());
    }
}
