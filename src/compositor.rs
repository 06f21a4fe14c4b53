use std::f32::consts::TAU;

use rayon::prelude::*;

use crate::raster::{luma, Raster};
use crate::reaction_diffusion::{smoothstep, Field};
use crate::types::CompositorUniforms;

const HUE_COOL: f32 = 0.60;
const HUE_WARM: f32 = 0.08;
const PATTERN_GAMMA: f32 = 0.65;
const DRIVING_BLEND: f32 = 0.35;

/// Angle inside the first wedge for `theta` in [0, 2π).
///
/// Odd wedges are mirrored so neighbouring wedges reflect each other.
pub fn fold_angle(theta: f32, symmetry: u32) -> f32 {
    let seg = wedge_width(symmetry);
    let idx = (theta / seg).floor();
    let local = (theta - idx * seg).clamp(0.0, seg);
    if (idx as i64).rem_euclid(2) == 1 {
        seg - local
    } else {
        local
    }
}

pub fn wedge_width(symmetry: u32) -> f32 {
    TAU / symmetry.max(1) as f32
}

/// Normalized field coordinate sampled for output coordinate `uv`.
pub fn fold_coordinate(uv: [f32; 2], symmetry: u32) -> [f32; 2] {
    let (r, theta) = polar(uv);
    folded_sample(r, theta, symmetry)
}

fn polar(uv: [f32; 2]) -> (f32, f32) {
    let px = (uv[0] - 0.5) * 2.0;
    let py = (uv[1] - 0.5) * 2.0;
    let r = (px * px + py * py).sqrt();
    let mut theta = py.atan2(px);
    if theta < 0.0 {
        theta += TAU;
    }
    // atan2 can round up to exactly 2π for tiny negative y.
    if theta >= TAU {
        theta = 0.0;
    }
    (r, theta)
}

fn folded_sample(r: f32, theta: f32, symmetry: u32) -> [f32; 2] {
    let local = fold_angle(theta, symmetry);
    let angle = local - 0.5 * wedge_width(symmetry);
    [angle.cos() * r * 0.5 + 0.5, angle.sin() * r * 0.5 + 0.5]
}

/// HSV in [0,1] to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let channel = |offset: f32| {
        let p = ((h + offset).fract() * 6.0 - 3.0).abs();
        let k = (p - 1.0).clamp(0.0, 1.0);
        v * (1.0 + (k - 1.0) * s)
    };
    [channel(1.0), channel(2.0 / 3.0), channel(1.0 / 3.0)]
}

/// Color of a single output pixel. No state is shared between pixels.
pub fn shade_pixel(
    uv: [f32; 2],
    field: &Field,
    driving: &Raster,
    uniforms: &CompositorUniforms,
) -> [f32; 3] {
    let (r, theta) = polar(uv);
    let base = folded_sample(r, theta, uniforms.symmetry);

    let pattern = field.sample_v(base[0], base[1]).clamp(0.0, 1.0);
    let m = pattern.powf(PATTERN_GAMMA);
    let edge = smoothstep(0.95, 1.0, r);

    let hue = HUE_COOL + (HUE_WARM - HUE_COOL) * (uniforms.valence + 1.0) * 0.5;
    let saturation = 0.55 + 0.4 * uniforms.valence.abs();
    let value = 0.45 + 0.55 * uniforms.arousal;
    let tint = hsv_to_rgb(hue, saturation, value);
    let gain = 0.35 + 0.75 * m;
    let mut color = [tint[0] * gain, tint[1] * gain, tint[2] * gain];

    let [low, _, high] = uniforms.bands;
    let center_glow = smoothstep(0.0, 0.65 + 0.2 * uniforms.arousal, 1.0 - r) * low * 0.003;
    for channel in &mut color {
        *channel += center_glow + high * 0.002;
    }

    let driving_luma = {
        let [dr, dg, db, _] = driving.sample(base[0], base[1]);
        luma([dr, dg, db])
    };
    let textured = 0.85 + 0.3 * driving_luma;
    let darken = 1.0 - 0.6 * edge;
    for channel in &mut color {
        let mixed = *channel + (*channel * textured - *channel) * DRIVING_BLEND;
        *channel = mixed * darken;
    }

    color
}

/// Renders the mandala into `out`, resizing it to `uniforms.resolution` if needed.
pub fn compose(field: &Field, driving: &Raster, uniforms: &CompositorUniforms, out: &mut Raster) {
    let res = uniforms.resolution.max(1);
    if out.dimensions() != [res, res] {
        *out = Raster::new(res, res);
    }

    out.pixels_mut()
        .par_chunks_mut(res)
        .enumerate()
        .for_each(|(y, row)| {
            let v = (y as f32 + 0.5) / res as f32;
            for (x, px) in row.iter_mut().enumerate() {
                let u = (x as f32 + 0.5) / res as f32;
                let [r, g, b] = shade_pixel([u, v], field, driving, uniforms);
                *px = [r, g, b, 1.0];
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_wedge_fold_is_identity() {
        for i in 0..64 {
            let theta = i as f32 / 64.0 * TAU;
            assert_eq!(fold_angle(theta, 1), theta);
        }
    }

    #[test]
    fn reflections_across_wedge_boundaries_fold_together() {
        for symmetry in [2_u32, 3, 6, 8, 13] {
            let seg = wedge_width(symmetry);
            for k in 1..symmetry {
                let boundary = k as f32 * seg;
                for delta in [0.01_f32, 0.1, 0.3] {
                    let delta = delta * seg;
                    let a = fold_angle(boundary - delta, symmetry);
                    let b = fold_angle(boundary + delta, symmetry);
                    assert!((a - b).abs() < 1.0e-4, "n={symmetry} k={k}: {a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn angles_a_few_ulps_from_a_boundary_do_not_seam() {
        let seg = wedge_width(8);
        assert!((fold_angle(3.926_990_7, 8) - seg).abs() < 1.0e-4);

        for symmetry in [3_u32, 5, 6, 8, 12] {
            let seg = wedge_width(symmetry);
            for k in 1..symmetry {
                let boundary = k as f32 * seg;
                let expected = if k % 2 == 1 { seg } else { 0.0 };
                for ulps in -8_i32..=8 {
                    let theta = f32::from_bits((boundary.to_bits() as i32 + ulps) as u32);
                    let folded = fold_angle(theta, symmetry);
                    assert!(
                        (folded - expected).abs() < 1.0e-4,
                        "n={symmetry} theta={theta}: {folded}"
                    );
                    assert!((0.0..=seg).contains(&folded));
                }
            }
        }
    }

    #[test]
    fn folded_coordinates_stay_in_the_unit_square() {
        for y in 0..32 {
            for x in 0..32 {
                let uv = [x as f32 / 31.0, y as f32 / 31.0];
                let [s, t] = fold_coordinate(uv, 8);
                // Corners reach r = √2, which maps just past the unit square.
                assert!((-0.21..=1.21).contains(&s) && (-0.21..=1.21).contains(&t));
            }
        }
    }

    #[test]
    fn hsv_primaries() {
        let red = hsv_to_rgb(0.0, 1.0, 1.0);
        assert!((red[0] - 1.0).abs() < 1.0e-5 && red[1].abs() < 1.0e-5 && red[2].abs() < 1.0e-5);
        let gray = hsv_to_rgb(0.4, 0.0, 0.5);
        assert!(gray.iter().all(|c| (c - 0.5).abs() < 1.0e-5));
    }

    #[test]
    fn valence_shifts_hue_from_cool_to_warm() {
        let field = Field::new(16);
        let driving = Raster::new(1, 1);
        let sad = CompositorUniforms {
            valence: -1.0,
            ..CompositorUniforms::default()
        };
        let happy = CompositorUniforms {
            valence: 1.0,
            ..CompositorUniforms::default()
        };
        let cool = shade_pixel([0.5, 0.6], &field, &driving, &sad);
        let warm = shade_pixel([0.5, 0.6], &field, &driving, &happy);
        assert!(cool[2] > cool[0]);
        assert!(warm[0] > warm[2]);
    }

    #[test]
    fn edges_are_darker_than_the_middle_ring() {
        let field = Field::new(16);
        let driving = Raster::new(1, 1);
        let uniforms = CompositorUniforms::default();
        let inner = shade_pixel([0.75, 0.5], &field, &driving, &uniforms);
        let outer = shade_pixel([0.999, 0.5], &field, &driving, &uniforms);
        assert!(outer[0] + outer[1] + outer[2] < inner[0] + inner[1] + inner[2]);
    }

    #[test]
    fn compose_fills_requested_resolution() {
        let field = Field::seeded(32);
        let driving = Raster::new(4, 4);
        let uniforms = CompositorUniforms {
            resolution: 24,
            ..CompositorUniforms::default()
        };
        let mut out = Raster::new(1, 1);
        compose(&field, &driving, &uniforms, &mut out);
        assert_eq!(out.dimensions(), [24, 24]);
        assert!(out.pixels().iter().all(|px| px[3] == 1.0 && px[0].is_finite()));
    }
}
