use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::RenderConfig;
use crate::raster::{over, premultiply, Raster, Rgba};
use crate::types::CompositorUniforms;

/// Clear color behind everything.
pub const BACKGROUND: Rgba = [3.0 / 255.0, 3.0 / 255.0, 3.0 / 255.0, 1.0];

const OVERLAY_SCALE: f32 = 0.98;
const OVERLAY_TINT: [f32; 3] = [120.0 / 255.0, 220.0 / 255.0, 170.0 / 255.0];

/// Concentric arcs, radial traces and vias drawn once from `seed`.
pub fn generate_overlay(size: usize, seed: u64) -> Raster {
    let mut layer = Raster::new(size, size);
    let mut rng = StdRng::seed_from_u64(seed);
    let center = [size as f32 * 0.5, size as f32 * 0.5];
    let radius = size as f32 * 0.47;

    let trace = premultiply([100.0 / 255.0, 220.0 / 255.0, 170.0 / 255.0], 90.0 / 255.0);
    for i in 0..18 {
        let r = radius * (0.15 + 0.8 * i as f32 / 18.0);
        let start = rng.gen_range(0.0..TAU);
        let stop = rng.gen_range(0.0..TAU);
        layer.stroke_arc(center, r, start, stop, trace);
    }

    for i in 0..220 {
        let angle = i as f32 / 220.0 * TAU + rng.gen_range(-0.015..0.015);
        let r1 = radius * rng.gen_range(0.18..0.95);
        let r2 = r1 + radius * rng.gen_range(0.02..0.12);
        let (sin, cos) = angle.sin_cos();
        layer.stroke_line(
            [center[0] + r1 * cos, center[1] + r1 * sin],
            [center[0] + r2 * cos, center[1] + r2 * sin],
            trace,
        );
    }

    let via = premultiply([120.0 / 255.0, 230.0 / 255.0, 180.0 / 255.0], 130.0 / 255.0);
    for _ in 0..180 {
        let angle = rng.gen_range(0.0..TAU);
        let r = radius * rng.gen_range(0.12..0.95);
        let diameter = rng.gen_range(2.0..4.0);
        layer.fill_circle(
            [center[0] + r * angle.cos(), center[1] + r * angle.sin()],
            diameter,
            via,
        );
    }

    layer
}

/// Separable box blur with edge clamping; `scratch` holds the horizontal pass.
pub fn box_blur(src: &Raster, radius: usize, scratch: &mut Raster, out: &mut Raster) {
    let [w, h] = src.dimensions();
    if scratch.dimensions() != [w, h] {
        *scratch = Raster::new(w, h);
    }
    if out.dimensions() != [w, h] {
        *out = Raster::new(w, h);
    }
    if w == 0 || h == 0 {
        return;
    }

    let norm = 1.0 / (2 * radius + 1) as f32;
    let src_px = src.pixels();
    scratch
        .pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            let line = &src_px[y * w..(y + 1) * w];
            for (x, px) in row.iter_mut().enumerate() {
                *px = window_sum(radius, norm, |offset| {
                    line[(x as i64 + offset).clamp(0, w as i64 - 1) as usize]
                });
            }
        });

    let horizontal = scratch.pixels();
    out.pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = window_sum(radius, norm, |offset| {
                    let yy = (y as i64 + offset).clamp(0, h as i64 - 1) as usize;
                    horizontal[yy * w + x]
                });
            }
        });
}

fn window_sum(radius: usize, norm: f32, at: impl Fn(i64) -> Rgba) -> Rgba {
    let r = radius as i64;
    let mut acc = [0.0; 4];
    for offset in -r..=r {
        let px = at(offset);
        for c in 0..4 {
            acc[c] += px[c];
        }
    }
    [acc[0] * norm, acc[1] * norm, acc[2] * norm, acc[3] * norm]
}

pub struct PostProcessor {
    overlay: Raster,
    glow: Raster,
    scratch: Raster,
    glow_radius: f32,
    glow_arousal_radius: f32,
}

impl PostProcessor {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            overlay: generate_overlay(config.compositor_resolution, config.overlay_seed),
            glow: Raster::new(0, 0),
            scratch: Raster::new(0, 0),
            glow_radius: config.glow_radius,
            glow_arousal_radius: config.glow_arousal_radius,
        }
    }

    pub fn overlay(&self) -> &Raster {
        &self.overlay
    }

    pub fn glow_radius_for(&self, arousal: f32) -> usize {
        (self.glow_radius + self.glow_arousal_radius * arousal.clamp(0.0, 1.0)).round() as usize
    }

    /// Layers flow → mandala → additive glow → tinted overlay into `out`.
    ///
    /// The mandala is drawn as a centered square as large as the shorter side
    /// of the trail surface.
    pub fn composite(
        &mut self,
        mandala: &Raster,
        trail: &Raster,
        uniforms: &CompositorUniforms,
        out: &mut Raster,
    ) {
        let radius = self.glow_radius_for(uniforms.arousal);
        box_blur(mandala, radius, &mut self.scratch, &mut self.glow);

        let [w, h] = trail.dimensions();
        if out.dimensions() != [w, h] {
            *out = Raster::new(w, h);
        }
        if w == 0 || h == 0 {
            return;
        }

        let square = w.min(h) as f32;
        let origin = [(w as f32 - square) * 0.5, (h as f32 - square) * 0.5];
        let angle = uniforms.time * 0.1 * (1.0 + uniforms.bands[1] * 1.5);
        let (sin, cos) = (-angle).sin_cos();
        let tint_alpha = ((60.0 + 120.0 * uniforms.arousal.clamp(0.0, 1.0)) / 255.0).min(1.0);

        let glow = &self.glow;
        let overlay = &self.overlay;
        let trail_px = trail.pixels();

        out.pixels_mut()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let mut color = over(trail_px[y * w + x], BACKGROUND);

                    let u = (x as f32 + 0.5 - origin[0]) / square;
                    let v = (y as f32 + 0.5 - origin[1]) / square;
                    if (0.0..1.0).contains(&u) && (0.0..1.0).contains(&v) {
                        color = mandala.sample(u, v);

                        let bloom = glow.sample(u, v);
                        for c in 0..3 {
                            color[c] += bloom[c];
                        }

                        // Rotate around the center, then shrink to the overlay's footprint.
                        let du = u - 0.5;
                        let dv = v - 0.5;
                        let ou = (du * cos - dv * sin) / OVERLAY_SCALE + 0.5;
                        let ov = (du * sin + dv * cos) / OVERLAY_SCALE + 0.5;
                        if (0.0..1.0).contains(&ou) && (0.0..1.0).contains(&ov) {
                            let trace = overlay.sample(ou, ov);
                            let tinted = [
                                trace[0] * OVERLAY_TINT[0] * tint_alpha,
                                trace[1] * OVERLAY_TINT[1] * tint_alpha,
                                trace[2] * OVERLAY_TINT[2] * tint_alpha,
                                trace[3] * tint_alpha,
                            ];
                            color = over(tinted, color);
                        }
                    }

                    *px = [
                        color[0].clamp(0.0, 1.0),
                        color[1].clamp(0.0, 1.0),
                        color[2].clamp(0.0, 1.0),
                        1.0,
                    ];
                }
            });
    }
}
