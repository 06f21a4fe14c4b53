use crate::compositor::compose;
use crate::config::MandalaConfig;
use crate::controller::{FrameParameters, ParameterController};
use crate::flow_field::FlowField;
use crate::motion::MotionEstimator;
use crate::post::PostProcessor;
use crate::raster::Raster;
use crate::reaction_diffusion::ReactionDiffusion;
use crate::sensors::SensorCache;
use crate::types::{Mode, PointerInput, RawSensors, SensoryState};

pub struct MandalaPipeline {
    engine: ReactionDiffusion,
    controller: ParameterController,
    flow: FlowField,
    post: PostProcessor,
    motion: MotionEstimator,
    driving: Raster,
    sensors: SensorCache,
    mandala: Raster,
    frame: Raster,
    last: Option<FrameParameters>,
}

impl MandalaPipeline {
    /// Builds every stage for a `width`×`height` output frame.
    pub fn new(config: &MandalaConfig, width: usize, height: usize) -> Self {
        let config = config.clone().validated();
        tracing::info!(
            field = config.simulation.resolution,
            compositor = config.render.compositor_resolution,
            width,
            height,
            "mandala pipeline created"
        );

        Self {
            engine: ReactionDiffusion::new(config.simulation.resolution),
            controller: ParameterController::new(
                config.controller.clone(),
                config.simulation.clone(),
                config.render.symmetry,
                config.render.compositor_resolution,
            ),
            flow: FlowField::new(width, height, config.flow.clone()),
            post: PostProcessor::new(&config.render),
            motion: MotionEstimator::new(),
            driving: Raster::filled(1, 1, [0.0, 0.0, 0.0, 1.0]),
            sensors: SensorCache::new(),
            mandala: Raster::new(0, 0),
            frame: Raster::new(width, height),
            last: None,
        }
    }

    pub fn engine(&self) -> &ReactionDiffusion {
        &self.engine
    }

    pub fn state(&self) -> &SensoryState {
        self.controller.state()
    }

    pub fn last_parameters(&self) -> Option<&FrameParameters> {
        self.last.as_ref()
    }

    pub fn frame(&self) -> &Raster {
        &self.frame
    }

    pub fn mandala(&self) -> &Raster {
        &self.mandala
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.controller.set_mode(mode);
    }

    pub fn symmetry(&self) -> u32 {
        self.controller.symmetry()
    }

    pub fn nudge_symmetry(&mut self, delta: i32) {
        self.controller.nudge_symmetry(delta);
    }

    pub fn set_pointer(&mut self, pointer: PointerInput) {
        self.controller.set_pointer(pointer);
    }

    pub fn force_feed_kill(&mut self, forced: Option<(f32, f32)>) {
        self.controller.force_feed_kill(forced);
    }

    pub fn forced_feed_kill(&self) -> Option<(f32, f32)> {
        self.controller.forced_feed_kill()
    }

    pub fn reseed(&mut self) {
        self.engine.reseed();
    }

    /// Cache the pipeline publishes camera motion into. Audio producers and
    /// the frame loop's reader share it.
    pub fn sensors(&self) -> &SensorCache {
        &self.sensors
    }

    /// Replaces the driving image and publishes a motion sample derived from it.
    pub fn submit_driving_frame(&mut self, frame: Raster) {
        self.sensors.publish_motion(self.motion.estimate(&frame));
        self.driving = frame;
    }

    /// Reallocates the flow layer and output frame for a new canvas size.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.frame.dimensions() == [width, height] {
            return;
        }
        tracing::info!(width, height, "canvas resized");
        self.flow.resize(width, height);
        self.frame = Raster::new(width, height);
    }

    /// Advances every stage by one displayed frame of `dt` seconds.
    pub fn tick(&mut self, raw: RawSensors, dt: f32) -> &Raster {
        let params = self.controller.update(&raw, dt);
        self.engine.advance_frame(&params.simulation, &self.driving);
        self.flow.step(params.state.arousal, params.state.mid, dt);

        compose(
            self.engine.current(),
            &self.driving,
            &params.uniforms,
            &mut self.mandala,
        );
        self.post.composite(
            &self.mandala,
            self.flow.trail(),
            &params.uniforms,
            &mut self.frame,
        );

        self.last = Some(params);
        &self.frame
    }
}
