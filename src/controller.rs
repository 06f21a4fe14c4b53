use crate::config::{ControllerConfig, SimulationConfig};
use crate::types::{
    CompositorUniforms, Mode, PointerInput, RawSensors, SensoryState, SignalReading,
    SimulationParams,
};

/// Frame rate the per-frame smoothing rates are tuned for.
pub const REFERENCE_FPS: f32 = 60.0;

/// Stable bounds enforced on externally forced feed/kill values.
pub const FEED_RANGE: (f32, f32) = (0.010, 0.08);
pub const KILL_RANGE: (f32, f32) = (0.03, 0.09);

/// Longest sensor gap credited to the next fresh sample.
pub const MAX_SIGNAL_GAP: f32 = 0.25;

/// Seconds each sensor's smoothing should cover this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SignalTime {
    pub audio: f32,
    pub motion: f32,
}

impl SignalTime {
    pub fn uniform(dt: f32) -> Self {
        Self {
            audio: dt,
            motion: dt,
        }
    }
}

/// Everything the rest of the frame needs from the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParameters {
    pub state: SensoryState,
    pub simulation: SimulationParams,
    pub uniforms: CompositorUniforms,
}

pub struct ParameterController {
    tuning: ControllerConfig,
    simulation: SimulationConfig,
    state: SensoryState,
    mode: Mode,
    symmetry: u32,
    pointer: PointerInput,
    forced: Option<(f32, f32)>,
    resolution: usize,
    elapsed: f32,
    pending: SignalTime,
}

impl ParameterController {
    pub fn new(
        tuning: ControllerConfig,
        simulation: SimulationConfig,
        symmetry: u32,
        resolution: usize,
    ) -> Self {
        Self {
            mode: tuning.mode,
            tuning,
            simulation,
            state: SensoryState::default(),
            symmetry: symmetry.max(1),
            pointer: PointerInput::default(),
            forced: None,
            resolution,
            elapsed: 0.0,
            pending: SignalTime::default(),
        }
    }

    pub fn state(&self) -> &SensoryState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            tracing::info!(mode = mode.label(), "mode changed");
        }
        self.mode = mode;
    }

    pub fn symmetry(&self) -> u32 {
        self.symmetry
    }

    pub fn set_symmetry(&mut self, symmetry: u32) {
        self.symmetry = symmetry.max(1);
        tracing::debug!(symmetry = self.symmetry, "symmetry changed");
    }

    pub fn nudge_symmetry(&mut self, delta: i32) {
        let next = (self.symmetry as i64 + delta as i64).clamp(1, u32::MAX as i64) as u32;
        self.set_symmetry(next);
    }

    pub fn set_pointer(&mut self, pointer: PointerInput) {
        self.pointer = pointer;
    }

    pub fn pointer(&self) -> PointerInput {
        self.pointer
    }

    /// Pins feed/kill to external values; they are still clamped to stable bounds.
    pub fn force_feed_kill(&mut self, forced: Option<(f32, f32)>) {
        self.forced = forced.map(|(feed, kill)| {
            let clamped = (
                feed.clamp(FEED_RANGE.0, FEED_RANGE.1),
                kill.clamp(KILL_RANGE.0, KILL_RANGE.1),
            );
            if clamped != (feed, kill) {
                tracing::warn!(feed, kill, "forced feed/kill outside stable range, clamped");
            }
            clamped
        });
    }

    pub fn forced_feed_kill(&self) -> Option<(f32, f32)> {
        self.forced
    }

    pub fn update(&mut self, raw: &RawSensors, dt: f32) -> FrameParameters {
        let dt = dt.max(0.0);
        self.elapsed += dt;

        // Stale frames bank their time for the next fresh sample.
        self.pending.audio = (self.pending.audio + dt).min(MAX_SIGNAL_GAP);
        self.pending.motion = (self.pending.motion + dt).min(MAX_SIGNAL_GAP);
        self.state = advance_state(&self.state, raw, self.pending, &self.tuning);
        if !matches!(raw.audio, SignalReading::Stale) {
            self.pending.audio = 0.0;
        }
        if !matches!(raw.motion, SignalReading::Stale) {
            self.pending.motion = 0.0;
        }

        let mut simulation = derive_simulation(
            &self.state,
            self.mode,
            &self.tuning,
            &self.simulation,
            self.pointer,
        );
        if let Some((feed, kill)) = self.forced {
            simulation.feed = feed;
            simulation.kill = kill;
        }

        FrameParameters {
            state: self.state,
            simulation,
            uniforms: CompositorUniforms {
                symmetry: self.symmetry,
                valence: self.state.valence,
                arousal: self.state.arousal,
                bands: self.state.bands(),
                resolution: self.resolution,
                time: self.elapsed,
            },
        }
    }
}

/// Converts a per-frame rate at [`REFERENCE_FPS`] into one for `dt` seconds.
pub fn frame_rate_alpha(alpha: f32, dt: f32) -> f32 {
    let frames = (dt * REFERENCE_FPS).max(0.0);
    1.0 - (1.0 - alpha.clamp(0.0, 1.0)).powf(frames)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// One smoothing step of the sensory state.
///
/// Missing audio decays toward a calm resting level; stale readings hold the
/// previous value. A fresh sample is smoothed over the time since the last
/// sample that was consumed, not over a single display frame.
pub fn advance_state(
    prev: &SensoryState,
    raw: &RawSensors,
    time: SignalTime,
    tuning: &ControllerConfig,
) -> SensoryState {
    let mut next = *prev;
    let band = frame_rate_alpha(tuning.band_rate, time.audio);
    let level = frame_rate_alpha(tuning.level_rate, time.audio);
    let arousal = frame_rate_alpha(tuning.arousal_rate, time.audio);
    let valence = frame_rate_alpha(tuning.valence_rate, time.audio);
    let idle = frame_rate_alpha(tuning.idle_rate, time.audio);

    match raw.audio {
        SignalReading::Fresh(sample) => {
            next.low = lerp(prev.low, sample.low, band).clamp(0.0, 1.0);
            next.mid = lerp(prev.mid, sample.mid, band).clamp(0.0, 1.0);
            next.high = lerp(prev.high, sample.high, band).clamp(0.0, 1.0);
            next.level = lerp(prev.level, sample.rms.max(0.0) * tuning.level_gain, level);
            next.arousal = lerp(prev.arousal, next.level, arousal).clamp(0.0, 1.0);

            let tilt = ((sample.high - sample.low) * tuning.valence_gain).clamp(-1.0, 1.0);
            next.valence = lerp(prev.valence, tilt, valence).clamp(-1.0, 1.0);
        }
        SignalReading::Stale => {}
        SignalReading::Unavailable => {
            next.low = lerp(prev.low, tuning.idle_band, idle).clamp(0.0, 1.0);
            next.mid = lerp(prev.mid, tuning.idle_band, idle).clamp(0.0, 1.0);
            next.high = lerp(prev.high, tuning.idle_band, idle).clamp(0.0, 1.0);
            next.level = lerp(prev.level, tuning.idle_level, idle);
            next.arousal = lerp(prev.arousal, next.level, idle).clamp(0.0, 1.0);
            next.valence = lerp(prev.valence, 0.0, idle).clamp(-1.0, 1.0);
        }
    }

    if let Some(motion) = raw.motion.fresh() {
        let growth = frame_rate_alpha(tuning.growth_rate, time.motion);
        next.growth =
            lerp(prev.growth, motion.max(0.0) * tuning.growth_gain, growth).clamp(0.0, 1.0);
    }

    next
}

/// Engine coefficients for the current state and mode.
pub fn derive_simulation(
    state: &SensoryState,
    mode: Mode,
    tuning: &ControllerConfig,
    simulation: &SimulationConfig,
    pointer: PointerInput,
) -> SimulationParams {
    let weights = mode.weights();

    let feed = (lerp(tuning.feed_low, tuning.feed_high, state.growth)
        + tuning.feed_high_band_weight * state.high * weights.audio)
        .clamp(tuning.feed_min, tuning.feed_max);
    let kill = (lerp(tuning.kill_low, tuning.kill_high, state.arousal)
        + tuning.kill_valence_weight * state.valence.abs())
        .clamp(tuning.kill_min, tuning.kill_max);

    SimulationParams {
        feed,
        kill,
        diff_u: simulation.diff_u,
        diff_v: simulation.diff_v,
        dt: simulation.dt,
        injection_point: pointer.position,
        injection_active: pointer.active && pointer.position.is_some(),
        injection_radius: simulation.brush_radius * weights.brush,
        injection_intensity: simulation.injection_intensity,
        driving_influence: tuning.camera_influence * weights.camera,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioSample;

    const FRAME: f32 = 1.0 / REFERENCE_FPS;

    fn controller() -> ParameterController {
        ParameterController::new(
            ControllerConfig::default(),
            SimulationConfig::default(),
            8,
            512,
        )
    }

    fn loud(high: f32, low: f32) -> RawSensors {
        RawSensors {
            audio: SignalReading::Fresh(AudioSample {
                low,
                mid: 0.5,
                high,
                rms: 0.3,
            }),
            motion: SignalReading::Fresh(0.4),
        }
    }

    #[test]
    fn rate_at_reference_frame_is_unchanged() {
        assert!((frame_rate_alpha(0.15, FRAME) - 0.15).abs() < 1.0e-5);
        assert!(frame_rate_alpha(0.15, 2.0 * FRAME) > 0.15);
        assert_eq!(frame_rate_alpha(0.15, 0.0), 0.0);
    }

    #[test]
    fn bright_audio_pushes_valence_positive() {
        let mut ctl = controller();
        for _ in 0..120 {
            ctl.update(&loud(0.9, 0.1), FRAME);
        }
        let state = ctl.state();
        assert!(state.valence > 0.9, "valence {}", state.valence);
        assert!(state.arousal > 0.8, "arousal {}", state.arousal);
        assert!(state.growth > 0.7, "growth {}", state.growth);
    }

    #[test]
    fn idle_audio_decays_to_rest() {
        let mut ctl = controller();
        for _ in 0..60 {
            ctl.update(&loud(0.9, 0.0), FRAME);
        }
        let mut last = ctl.state().arousal;
        for _ in 0..600 {
            ctl.update(&RawSensors::default(), FRAME);
            let arousal = ctl.state().arousal;
            assert!(arousal <= last + 1.0e-6);
            last = arousal;
        }
        assert!(last <= 0.15 && last >= 0.0, "arousal {last}");
        assert!(ctl.state().valence.abs() < 0.01);
    }

    #[test]
    fn stale_reading_holds_state() {
        let mut ctl = controller();
        ctl.update(&loud(0.7, 0.2), FRAME);
        let before = *ctl.state();
        ctl.update(
            &RawSensors {
                audio: SignalReading::Stale,
                motion: SignalReading::Stale,
            },
            FRAME,
        );
        assert_eq!(*ctl.state(), before);
    }

    // Audio blocks arrive at 60/s; frame `k` sees a new block whenever
    // `k * 60 / fps` advances.
    fn step_response(fps: u32, seconds: f32) -> SensoryState {
        let mut ctl = controller();
        let frames = (seconds * fps as f32).round() as u32;
        for k in 1..=frames {
            let audio = if k * 60 / fps > (k - 1) * 60 / fps {
                SignalReading::Fresh(AudioSample {
                    low: 1.0,
                    mid: 1.0,
                    high: 1.0,
                    rms: 0.3,
                })
            } else {
                SignalReading::Stale
            };
            let motion = match audio {
                SignalReading::Fresh(_) => SignalReading::Fresh(0.5),
                _ => SignalReading::Stale,
            };
            ctl.update(&RawSensors { audio, motion }, 1.0 / fps as f32);
        }
        *ctl.state()
    }

    #[test]
    fn smoothing_speed_ignores_display_refresh_rate() {
        let reference = step_response(60, 0.25);
        let expected = 1.0 - (1.0 - ControllerConfig::default().band_rate).powi(15);
        assert!((reference.low - expected).abs() < 1.0e-4, "low {}", reference.low);

        for fps in [120, 144, 240] {
            let state = step_response(fps, 0.25);
            assert!(
                (state.low - reference.low).abs() < 1.0e-3,
                "{fps} Hz low {} vs {}",
                state.low,
                reference.low
            );
            assert!((state.arousal - reference.arousal).abs() < 1.0e-3, "{fps} Hz");
            assert!((state.growth - reference.growth).abs() < 1.0e-3, "{fps} Hz");
        }
    }

    #[test]
    fn long_sensor_gap_is_capped() {
        let mut ctl = controller();
        let stale = RawSensors {
            audio: SignalReading::Stale,
            motion: SignalReading::Stale,
        };
        for _ in 0..600 {
            ctl.update(&stale, FRAME);
        }
        ctl.update(&loud(1.0, 1.0), FRAME);
        let cap = frame_rate_alpha(ControllerConfig::default().band_rate, MAX_SIGNAL_GAP);
        assert!((ctl.state().low - cap).abs() < 1.0e-4, "low {}", ctl.state().low);
    }

    #[test]
    fn feed_and_kill_stay_in_bounds() {
        let tuning = ControllerConfig::default();
        let sim = SimulationConfig::default();
        let extreme = SensoryState {
            low: 1.0,
            mid: 1.0,
            high: 1.0,
            level: 3.0,
            growth: 1.0,
            valence: -1.0,
            arousal: 1.0,
        };
        for mode in Mode::ALL {
            let params = derive_simulation(&extreme, mode, &tuning, &sim, PointerInput::default());
            assert!((tuning.feed_min..=tuning.feed_max).contains(&params.feed));
            assert!((tuning.kill_min..=tuning.kill_max).contains(&params.kill));
        }
    }

    #[test]
    fn draw_mode_scales_brush_radius() {
        let tuning = ControllerConfig::default();
        let sim = SimulationConfig::default();
        let pointer = PointerInput {
            position: Some([0.5, 0.5]),
            active: true,
        };
        let state = SensoryState::default();
        let observe = derive_simulation(&state, Mode::Observe, &tuning, &sim, pointer);
        let draw = derive_simulation(&state, Mode::Draw, &tuning, &sim, pointer);
        assert!((draw.injection_radius - sim.brush_radius * 1.4).abs() < 1.0e-6);
        assert!(draw.injection_radius > observe.injection_radius);
        assert!(draw.injection_active);
        assert!((observe.driving_influence - 0.36).abs() < 1.0e-6);
    }

    #[test]
    fn forced_values_are_clamped() {
        let mut ctl = controller();
        ctl.force_feed_kill(Some((0.5, 0.0)));
        let frame = ctl.update(&RawSensors::default(), FRAME);
        assert_eq!(frame.simulation.feed, FEED_RANGE.1);
        assert_eq!(frame.simulation.kill, KILL_RANGE.0);

        ctl.force_feed_kill(None);
        let frame = ctl.update(&RawSensors::default(), FRAME);
        assert!(frame.simulation.feed <= ControllerConfig::default().feed_max);
    }

    #[test]
    fn symmetry_never_drops_below_one() {
        let mut ctl = controller();
        ctl.set_symmetry(2);
        ctl.nudge_symmetry(-1);
        ctl.nudge_symmetry(-1);
        assert_eq!(ctl.symmetry(), 1);
        ctl.nudge_symmetry(1);
        let frame = ctl.update(&RawSensors::default(), FRAME);
        assert_eq!(frame.uniforms.symmetry, 2);
    }
}
