use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Mode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MANDALA_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "mandala.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandalaConfig {
    pub simulation: SimulationConfig,
    pub controller: ControllerConfig,
    pub flow: FlowConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub resolution: usize,
    pub diff_u: f32,
    pub diff_v: f32,
    pub dt: f32,
    pub brush_radius: f32,
    pub injection_intensity: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            diff_u: 0.16,
            diff_v: 0.08,
            dt: 1.0,
            brush_radius: 0.04,
            injection_intensity: 1.0,
        }
    }
}

/// Smoothing rates are per frame at 60 Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub mode: Mode,
    pub band_rate: f32,
    pub level_rate: f32,
    pub arousal_rate: f32,
    pub valence_rate: f32,
    pub growth_rate: f32,
    pub idle_rate: f32,
    pub level_gain: f32,
    pub valence_gain: f32,
    pub growth_gain: f32,
    pub idle_band: f32,
    pub idle_level: f32,
    pub feed_low: f32,
    pub feed_high: f32,
    pub feed_high_band_weight: f32,
    pub feed_min: f32,
    pub feed_max: f32,
    pub kill_low: f32,
    pub kill_high: f32,
    pub kill_valence_weight: f32,
    pub kill_min: f32,
    pub kill_max: f32,
    pub camera_influence: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Observe,
            band_rate: 0.15,
            level_rate: 0.2,
            arousal_rate: 0.25,
            valence_rate: 0.15,
            growth_rate: 0.25,
            idle_rate: 0.02,
            level_gain: 3.0,
            valence_gain: 1.8,
            growth_gain: 2.0,
            idle_band: 0.05,
            idle_level: 0.12,
            feed_low: 0.018,
            feed_high: 0.060,
            feed_high_band_weight: 0.002,
            feed_min: 0.015,
            feed_max: 0.075,
            kill_low: 0.045,
            kill_high: 0.070,
            kill_valence_weight: 0.003,
            kill_min: 0.040,
            kill_max: 0.085,
            camera_influence: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub particles: usize,
    /// Fraction of the trail removed each frame.
    pub fade: f32,
    pub base_speed: f32,
    pub arousal_speed: f32,
    pub noise_scale: f32,
    pub mid_noise_scale: f32,
    pub time_rate: f32,
    pub arousal_time_rate: f32,
    pub seed: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            particles: 2800,
            fade: 18.0 / 255.0,
            base_speed: 0.6,
            arousal_speed: 1.2,
            noise_scale: 0.0018,
            mid_noise_scale: 0.001,
            time_rate: 0.006,
            arousal_time_rate: 0.01,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub symmetry: u32,
    pub compositor_resolution: usize,
    pub glow_radius: f32,
    pub glow_arousal_radius: f32,
    pub overlay_seed: u64,
    pub show_hud: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            symmetry: 8,
            compositor_resolution: 512,
            glow_radius: 2.0,
            glow_arousal_radius: 4.0,
            overlay_seed: 0x5EED_0F_AB,
            show_hud: true,
        }
    }
}

impl MandalaConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(text)
            .map(Self::validated)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// `$MANDALA_CONFIG`, then `./mandala.toml`, then defaults.
    ///
    /// A broken file is logged and replaced by defaults so the visuals still run.
    pub fn discover() -> Self {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = match explicit {
            Some(path) => path,
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.exists() {
                    tracing::info!("no config file found, using defaults");
                    return Self::default();
                }
                local
            }
        };

        match Self::load(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                config
            }
            Err(err) => {
                tracing::warn!(error = %err, "falling back to default config");
                Self::default()
            }
        }
    }

    /// Clamps values that would stall or destabilize the pipeline.
    pub fn validated(mut self) -> Self {
        let sim = &mut self.simulation;
        sim.resolution = clamp_logged("simulation.resolution", sim.resolution, 8, 2048);
        sim.dt = clamp_logged("simulation.dt", sim.dt, 0.05, 1.5);
        sim.diff_u = clamp_logged("simulation.diff_u", sim.diff_u, 0.0, 1.0);
        sim.diff_v = clamp_logged("simulation.diff_v", sim.diff_v, 0.0, 1.0);
        sim.brush_radius = clamp_logged("simulation.brush_radius", sim.brush_radius, 0.0, 0.5);

        let ctl = &mut self.controller;
        ctl.feed_min = clamp_logged("controller.feed_min", ctl.feed_min, 0.010, 0.08);
        ctl.feed_max = clamp_logged("controller.feed_max", ctl.feed_max, ctl.feed_min, 0.08);
        ctl.kill_min = clamp_logged("controller.kill_min", ctl.kill_min, 0.03, 0.09);
        ctl.kill_max = clamp_logged("controller.kill_max", ctl.kill_max, ctl.kill_min, 0.09);
        for (name, rate) in [
            ("controller.band_rate", &mut ctl.band_rate),
            ("controller.level_rate", &mut ctl.level_rate),
            ("controller.arousal_rate", &mut ctl.arousal_rate),
            ("controller.valence_rate", &mut ctl.valence_rate),
            ("controller.growth_rate", &mut ctl.growth_rate),
            ("controller.idle_rate", &mut ctl.idle_rate),
        ] {
            *rate = clamp_logged(name, *rate, 0.001, 1.0);
        }

        self.flow.fade = clamp_logged("flow.fade", self.flow.fade, 0.0, 1.0);
        self.render.symmetry = self.render.symmetry.max(1);
        let resolution = self.render.compositor_resolution;
        self.render.compositor_resolution =
            clamp_logged("render.compositor_resolution", resolution, 8, 2048);
        self
    }
}

fn clamp_logged<T: PartialOrd + Copy + std::fmt::Debug>(name: &str, value: T, min: T, max: T) -> T {
    let clamped = if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    };
    if clamped != value {
        tracing::warn!(field = name, ?value, ?clamped, "config value out of range");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let text = r#"
            [render]
            symmetry = 12

            [controller]
            mode = "ancestor"
        "#;
        let config = MandalaConfig::from_toml_str(text, Path::new("inline.toml")).unwrap();
        assert_eq!(config.render.symmetry, 12);
        assert_eq!(config.controller.mode, Mode::Ancestor);
        assert_eq!(config.simulation, SimulationConfig::default());
        assert_eq!(config.flow.particles, 2800);
    }

    #[test]
    fn unstable_values_are_clamped() {
        let text = r#"
            [controller]
            feed_max = 0.5
            kill_min = 0.0

            [render]
            symmetry = 0
        "#;
        let config = MandalaConfig::from_toml_str(text, Path::new("inline.toml")).unwrap();
        assert_eq!(config.controller.feed_max, 0.08);
        assert_eq!(config.controller.kill_min, 0.03);
        assert_eq!(config.render.symmetry, 1);
    }

    #[test]
    fn malformed_file_reports_path() {
        let err = MandalaConfig::from_toml_str("[render\nsymmetry=", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = MandalaConfig::load("/definitely/not/here/mandala.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
