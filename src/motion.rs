use crate::raster::{luma, Raster};

pub const MOTION_GRID: usize = 64;

/// Mean luminance-weighted frame difference on a mirrored 64×64 thumbnail.
pub struct MotionEstimator {
    previous: Option<Vec<[f32; 3]>>,
    current: Vec<[f32; 3]>,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self {
            previous: None,
            current: vec![[0.0; 3]; MOTION_GRID * MOTION_GRID],
        }
    }

    /// Returns the motion sample for `frame`, 0 for the first frame seen.
    pub fn estimate(&mut self, frame: &Raster) -> f32 {
        for (idx, px) in self.current.iter_mut().enumerate() {
            let x = idx % MOTION_GRID;
            let y = idx / MOTION_GRID;
            // Mirrored so motion reads like a selfie view.
            let u = 1.0 - (x as f32 + 0.5) / MOTION_GRID as f32;
            let v = (y as f32 + 0.5) / MOTION_GRID as f32;
            let [r, g, b, _] = frame.sample(u, v);
            *px = [r, g, b];
        }

        let motion = match &self.previous {
            None => 0.0,
            Some(previous) => {
                let sum: f32 = self
                    .current
                    .iter()
                    .zip(previous)
                    .map(|(now, before)| {
                        luma([
                            (now[0] - before[0]).abs(),
                            (now[1] - before[1]).abs(),
                            (now[2] - before[2]).abs(),
                        ])
                    })
                    .sum();
                sum / self.current.len() as f32
            }
        };

        let previous = self.previous.get_or_insert_with(Vec::new);
        previous.clear();
        previous.extend_from_slice(&self.current);
        motion
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_reports_no_motion() {
        let mut estimator = MotionEstimator::new();
        assert_eq!(estimator.estimate(&Raster::filled(8, 8, [1.0, 1.0, 1.0, 1.0])), 0.0);
    }

    #[test]
    fn still_scene_reports_no_motion() {
        let mut estimator = MotionEstimator::new();
        let frame = Raster::filled(32, 24, [0.3, 0.6, 0.2, 1.0]);
        estimator.estimate(&frame);
        assert_eq!(estimator.estimate(&frame), 0.0);
    }

    #[test]
    fn black_to_white_is_full_motion() {
        let mut estimator = MotionEstimator::new();
        estimator.estimate(&Raster::filled(16, 16, [0.0, 0.0, 0.0, 1.0]));
        let motion = estimator.estimate(&Raster::filled(16, 16, [1.0, 1.0, 1.0, 1.0]));
        assert!((motion - 1.0).abs() < 1.0e-4, "{motion}");

        estimator.reset();
        assert_eq!(estimator.estimate(&Raster::new(16, 16)), 0.0);
    }
}
