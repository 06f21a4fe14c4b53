use std::f32::consts::TAU;

use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::FlowConfig;
use crate::controller::REFERENCE_FPS;
use crate::raster::{premultiply, Raster};

const TRAIL_RGB: [f32; 3] = [180.0 / 255.0, 210.0 / 255.0, 1.0];
const TRAIL_ALPHA: f32 = 36.0 / 255.0;
const TRAIL_AROUSAL_ALPHA: f32 = 50.0 / 255.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

pub struct FlowField {
    width: usize,
    height: usize,
    particles: Vec<Particle>,
    trail: Raster,
    noise: Perlin,
    time: f64,
    rng: StdRng,
    config: FlowConfig,
}

impl FlowField {
    pub fn new(width: usize, height: usize, config: FlowConfig) -> Self {
        let mut flow = Self {
            width,
            height,
            particles: Vec::new(),
            trail: Raster::new(width, height),
            noise: Perlin::new(config.seed),
            time: 0.0,
            rng: StdRng::seed_from_u64(config.seed as u64),
            config,
        };
        flow.scatter();
        flow
    }

    pub fn dimensions(&self) -> [usize; 2] {
        [self.width, self.height]
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn trail(&self) -> &Raster {
        &self.trail
    }

    /// Reallocates the trail and scatters the particles over the new canvas.
    pub fn resize(&mut self, width: usize, height: usize) {
        if [width, height] == self.dimensions() {
            return;
        }
        tracing::debug!(width, height, "flow field resized");
        self.width = width;
        self.height = height;
        self.trail = Raster::new(width, height);
        self.scatter();
    }

    fn scatter(&mut self) {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        let rng = &mut self.rng;
        self.particles = (0..self.config.particles)
            .map(|_| Particle {
                x: rng.gen_range(0.0..w),
                y: rng.gen_range(0.0..h),
                vx: 0.0,
                vy: 0.0,
            })
            .collect();
    }

    /// Fades the trail, advects every particle one Euler step and strokes its path.
    pub fn step(&mut self, arousal: f32, mid: f32, dt: f32) {
        let frames = (dt * REFERENCE_FPS).max(0.0);
        let arousal = arousal.clamp(0.0, 1.0);

        self.time += ((self.config.time_rate + self.config.arousal_time_rate * arousal) * frames)
            as f64;
        self.fade(frames);

        if self.width == 0 || self.height == 0 {
            return;
        }

        let scale = (self.config.noise_scale + self.config.mid_noise_scale * mid) as f64;
        let speed = (self.config.base_speed + self.config.arousal_speed * arousal) * frames;
        let stroke = premultiply(TRAIL_RGB, TRAIL_ALPHA + TRAIL_AROUSAL_ALPHA * arousal);
        let width = self.width as f32;
        let height = self.height as f32;

        for particle in &mut self.particles {
            let n = self.noise.get([
                particle.x as f64 * scale,
                particle.y as f64 * scale,
                self.time,
            ]) as f32;
            // Perlin is roughly [-1, 1]; map to [0, 1] before turning it into an angle.
            let angle = (n * 0.5 + 0.5) * TAU * 2.0;
            particle.vx = angle.cos() * speed;
            particle.vy = angle.sin() * speed;

            let from = [particle.x, particle.y];
            let to = [particle.x + particle.vx, particle.y + particle.vy];
            self.trail.stroke_line(from, to, stroke);

            particle.x = wrap(to[0], width);
            particle.y = wrap(to[1], height);
        }
    }

    fn fade(&mut self, frames: f32) {
        let keep = (1.0 - self.config.fade).powf(frames);
        self.trail.pixels_mut().par_iter_mut().for_each(|px| {
            for channel in px.iter_mut() {
                *channel *= keep;
            }
        });
    }
}

/// Toroidal wrap into `[0, extent)`.
pub fn wrap(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}
