use rayon::prelude::*;

use crate::raster::Raster;
use crate::types::SimulationParams;

pub const SUBSTEPS_PER_FRAME: usize = 2;

/// Peak amount the pointer brush adds to `v` at its center.
pub const INJECTION_PEAK: f32 = 0.35;

pub const DRIVING_BIAS: f32 = 0.01;

const SEED_THRESHOLD: f64 = 0.995;
const SEED_VALUE: f32 = 0.9;

#[derive(Clone, Debug)]
pub struct Field {
    size: usize,
    u: Vec<f32>,
    v: Vec<f32>,
}

impl Field {
    pub fn new(size: usize) -> Self {
        let len = size * size;
        Self {
            size,
            u: vec![1.0; len],
            v: vec![0.0; len],
        }
    }

    /// `u = 1` everywhere with sparse hashed nucleation sites in `v`.
    pub fn seeded(size: usize) -> Self {
        let mut field = Self::new(size);
        field.seed();
        field
    }

    pub fn seed(&mut self) {
        self.u.fill(1.0);
        let size = self.size;
        for (idx, v) in self.v.iter_mut().enumerate() {
            let x = (idx % size) as f64 + 0.5;
            let y = (idx / size) as f64 + 0.5;
            let hashed = seed_hash(x / size as f64 * 1024.0, y / size as f64 * 768.0);
            *v = if hashed >= SEED_THRESHOLD {
                SEED_VALUE
            } else {
                0.0
            };
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn u(&self) -> &[f32] {
        &self.u
    }

    pub fn v(&self) -> &[f32] {
        &self.v
    }

    pub fn set_cell(&mut self, x: usize, y: usize, u: f32, v: f32) {
        let idx = y * self.size + x;
        self.u[idx] = u;
        self.v[idx] = v;
    }

    pub fn mean_v(&self) -> f32 {
        if self.v.is_empty() {
            return 0.0;
        }
        self.v.iter().sum::<f32>() / self.v.len() as f32
    }

    /// Bilinear sample of `v` at a normalized coordinate, clamped at the edges.
    pub fn sample_v(&self, x: f32, y: f32) -> f32 {
        if self.size == 0 {
            return 0.0;
        }
        let max = (self.size - 1) as f32;
        let fx = (x * self.size as f32 - 0.5).clamp(0.0, max);
        let fy = (y * self.size as f32 - 0.5).clamp(0.0, max);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.size - 1);
        let y1 = (y0 + 1).min(self.size - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let at = |xx: usize, yy: usize| self.v[yy * self.size + xx];
        let top = at(x0, y0) + (at(x1, y0) - at(x0, y0)) * tx;
        let bottom = at(x0, y1) + (at(x1, y1) - at(x0, y1)) * tx;
        top + (bottom - top) * ty
    }
}

/// Ping-pong pair of fields. `current` is read, `next` is written, then they swap.
pub struct ReactionDiffusion {
    current: Field,
    next: Field,
    steps: u64,
}

impl ReactionDiffusion {
    pub fn new(size: usize) -> Self {
        Self {
            current: Field::seeded(size),
            next: Field::new(size),
            steps: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.current.size
    }

    pub fn current(&self) -> &Field {
        &self.current
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn reseed(&mut self) {
        self.current.seed();
        self.steps = 0;
        tracing::debug!(size = self.current.size, "reaction-diffusion field reseeded");
    }

    pub fn step(&mut self, params: &SimulationParams, driving: &Raster) {
        step_field(&self.current, &mut self.next, params, driving);
        std::mem::swap(&mut self.current, &mut self.next);
        self.steps += 1;
    }

    pub fn advance_frame(&mut self, params: &SimulationParams, driving: &Raster) {
        for _ in 0..SUBSTEPS_PER_FRAME {
            self.step(params, driving);
        }
    }
}

/// Writes one Gray–Scott update of `current` into `next`.
///
/// Rows are independent so they are updated in parallel; every cell reads
/// only `current` and the uniforms.
pub fn step_field(current: &Field, next: &mut Field, params: &SimulationParams, driving: &Raster) {
    let size = current.size;
    debug_assert_eq!(size, next.size);
    if size == 0 {
        return;
    }

    let Field {
        u: next_u,
        v: next_v,
        ..
    } = next;

    next_u
        .par_chunks_mut(size)
        .zip(next_v.par_chunks_mut(size))
        .enumerate()
        .for_each(|(y, (u_row, v_row))| {
            for x in 0..size {
                let idx = y * size + x;
                let u = current.u[idx];
                let v = current.v[idx];
                let lap_u = laplacian(&current.u, size, x, y);
                let lap_v = laplacian(&current.v, size, x, y);
                let reaction = u * v * v;

                let du = params.diff_u * lap_u - reaction + params.feed * (1.0 - u);
                let dv = params.diff_v * lap_v + reaction - (params.feed + params.kill) * v;

                let pos = [
                    (x as f32 + 0.5) / size as f32,
                    (y as f32 + 0.5) / size as f32,
                ];
                let added = injection_amount(params, pos)
                    + params.driving_influence * driving.luma_at(pos[0], pos[1]) * DRIVING_BIAS;

                u_row[x] = (u + du * params.dt).clamp(0.0, 1.0);
                v_row[x] = (v + dv * params.dt + added).clamp(0.0, 1.0);
            }
        });
}

/// Brush contribution to `v` at a normalized position, before clamping.
pub fn injection_amount(params: &SimulationParams, pos: [f32; 2]) -> f32 {
    if !params.injection_active || params.injection_radius <= 0.0 {
        return 0.0;
    }
    let Some(point) = params.injection_point else {
        return 0.0;
    };

    let dx = pos[0] - point[0];
    let dy = pos[1] - point[1];
    let dist = (dx * dx + dy * dy).sqrt();
    smoothstep(params.injection_radius, 0.0, dist) * INJECTION_PEAK * params.injection_intensity
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// Neighbors outside the grid read the nearest edge cell.
fn laplacian(field: &[f32], size: usize, x: usize, y: usize) -> f32 {
    let xm = x.saturating_sub(1);
    let xp = (x + 1).min(size - 1);
    let ym = y.saturating_sub(1);
    let yp = (y + 1).min(size - 1);

    let idx = |xx: usize, yy: usize| -> usize { yy * size + xx };

    -field[idx(x, y)]
        + 0.2 * (field[idx(xm, y)] + field[idx(xp, y)] + field[idx(x, ym)] + field[idx(x, yp)])
        + 0.05
            * (field[idx(xm, ym)] + field[idx(xp, ym)] + field[idx(xm, yp)] + field[idx(xp, yp)])
}

fn seed_hash(px: f64, py: f64) -> f64 {
    let s = (px * 27.168 + py * 38.341).sin() * 1753.113;
    s - s.floor()
}
