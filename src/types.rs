use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    pub feed: f32,
    pub kill: f32,
    pub diff_u: f32,
    pub diff_v: f32,
    pub dt: f32,
    /// Normalized injection point, `None` when no pointer has touched the field yet.
    pub injection_point: Option<[f32; 2]>,
    pub injection_active: bool,
    pub injection_radius: f32,
    pub injection_intensity: f32,
    /// Weight of the driving image's luminance bias on `v`.
    pub driving_influence: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            feed: 0.035,
            kill: 0.06,
            diff_u: 0.16,
            diff_v: 0.08,
            dt: 1.0,
            injection_point: None,
            injection_active: false,
            injection_radius: 0.04,
            injection_intensity: 1.0,
            driving_influence: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioSample {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
    pub rms: f32,
}

/// What a sensor delivered for this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SignalReading<T> {
    /// Access was never granted or the device went away.
    Unavailable,
    /// The sensor is alive but nothing new arrived since the last frame.
    Stale,
    Fresh(T),
}

impl<T> Default for SignalReading<T> {
    fn default() -> Self {
        Self::Unavailable
    }
}

impl<T: Copy> SignalReading<T> {
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    pub fn fresh(&self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawSensors {
    pub audio: SignalReading<AudioSample>,
    /// Mean frame-difference of the driving image, roughly in [0, 1].
    pub motion: SignalReading<f32>,
}

/// Smoothed sensory state. Owned by the controller, read by everything downstream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensoryState {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
    pub level: f32,
    pub growth: f32,
    pub valence: f32,
    pub arousal: f32,
}

impl Default for SensoryState {
    fn default() -> Self {
        Self {
            low: 0.0,
            mid: 0.0,
            high: 0.0,
            level: 0.0,
            growth: 0.0,
            valence: 0.0,
            arousal: 0.0,
        }
    }
}

impl SensoryState {
    pub fn bands(&self) -> [f32; 3] {
        [self.low, self.mid, self.high]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorUniforms {
    pub symmetry: u32,
    pub valence: f32,
    pub arousal: f32,
    pub bands: [f32; 3],
    pub resolution: usize,
    pub time: f32,
}

impl Default for CompositorUniforms {
    fn default() -> Self {
        Self {
            symmetry: 8,
            valence: 0.0,
            arousal: 0.0,
            bands: [0.0; 3],
            resolution: 512,
            time: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Observe,
    Draw,
    Ancestor,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeWeights {
    pub camera: f32,
    pub audio: f32,
    pub brush: f32,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Observe, Mode::Draw, Mode::Ancestor];

    pub fn weights(self) -> ModeWeights {
        match self {
            Mode::Observe => ModeWeights {
                camera: 0.6,
                audio: 1.0,
                brush: 1.0,
            },
            Mode::Draw => ModeWeights {
                camera: 0.5,
                audio: 0.8,
                brush: 1.4,
            },
            Mode::Ancestor => ModeWeights {
                camera: 0.7,
                audio: 1.25,
                brush: 1.0,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Observe => "observe",
            Mode::Draw => "draw",
            Mode::Ancestor => "ancestor",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerInput {
    pub position: Option<[f32; 2]>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_mode_widens_the_brush() {
        assert!(Mode::Draw.weights().brush > Mode::Observe.weights().brush);
        assert!(Mode::Ancestor.weights().audio > Mode::Observe.weights().audio);
    }

    #[test]
    fn stale_reading_carries_no_value() {
        let reading: SignalReading<f32> = SignalReading::Stale;
        assert!(reading.is_available());
        assert_eq!(reading.fresh(), None);
        assert!(!SignalReading::<f32>::Unavailable.is_available());
    }
}
