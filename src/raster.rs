pub type Rgba = [f32; 4];

pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Raster {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    pub fn filled(width: usize, height: usize, color: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Builds an opaque raster from unpremultiplied 8-bit RGBA rows.
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Self {
        let mut raster = Self::new(width, height);
        for (px, chunk) in raster.pixels.iter_mut().zip(bytes.chunks_exact(4)) {
            let a = chunk[3] as f32 / 255.0;
            *px = [
                chunk[0] as f32 / 255.0 * a,
                chunk[1] as f32 / 255.0 * a,
                chunk[2] as f32 / 255.0 * a,
                a,
            ];
        }
        raster
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> [usize; 2] {
        [self.width, self.height]
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    pub fn get(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Bilinear sample at a normalized coordinate, clamped at the edges.
    pub fn sample(&self, u: f32, v: f32) -> Rgba {
        if self.width == 0 || self.height == 0 {
            return TRANSPARENT;
        }

        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = mix(self.get(x0, y0), self.get(x1, y0), tx);
        let bottom = mix(self.get(x0, y1), self.get(x1, y1), tx);
        mix(top, bottom, ty)
    }

    pub fn luma_at(&self, u: f32, v: f32) -> f32 {
        let [r, g, b, _] = self.sample(u, v);
        luma([r, g, b])
    }

    /// Source-over blend of a premultiplied color onto one pixel.
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        self.pixels[idx] = over(color, self.pixels[idx]);
    }

    pub fn stroke_line(&mut self, from: [f32; 2], to: [f32; 2], color: Rgba) {
        let dx = to[0] - from[0];
        let dy = to[1] - from[1];
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from[0] + dx * t;
            let y = from[1] + dy * t;
            self.blend_pixel(x.floor() as i64, y.floor() as i64, color);
        }
    }

    /// Arc around `center` sweeping from `start` to `stop` radians.
    pub fn stroke_arc(
        &mut self,
        center: [f32; 2],
        radius: f32,
        start: f32,
        stop: f32,
        color: Rgba,
    ) {
        let mut sweep = stop - start;
        if sweep < 0.0 {
            sweep += std::f32::consts::TAU;
        }
        let steps = (sweep * radius).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let angle = start + sweep * i as f32 / steps as f32;
            let x = center[0] + radius * angle.cos();
            let y = center[1] + radius * angle.sin();
            self.blend_pixel(x.floor() as i64, y.floor() as i64, color);
        }
    }

    pub fn fill_circle(&mut self, center: [f32; 2], diameter: f32, color: Rgba) {
        let radius = diameter * 0.5;
        let x0 = (center[0] - radius).floor() as i64;
        let x1 = (center[0] + radius).ceil() as i64;
        let y0 = (center[1] - radius).floor() as i64;
        let y1 = (center[1] + radius).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center[0];
                let dy = y as f32 + 0.5 - center[1];
                if dx * dx + dy * dy <= radius * radius {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    /// Unpremultiplied 8-bit RGBA, the layout texture uploads and exporters expect.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for &[r, g, b, a] in &self.pixels {
            let inv = if a > 1.0e-6 { 1.0 / a } else { 0.0 };
            rgba.extend_from_slice(&[
                to_u8(r * inv),
                to_u8(g * inv),
                to_u8(b * inv),
                to_u8(a),
            ]);
        }
        rgba
    }
}

pub fn luma(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

pub fn over(src: Rgba, dst: Rgba) -> Rgba {
    let keep = 1.0 - src[3];
    [
        src[0] + dst[0] * keep,
        src[1] + dst[1] * keep,
        src[2] + dst[2] * keep,
        src[3] + dst[3] * keep,
    ]
}

pub fn premultiply(rgb: [f32; 3], alpha: f32) -> Rgba {
    [rgb[0] * alpha, rgb[1] * alpha, rgb[2] * alpha, alpha]
}

fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_clamps_outside_the_unit_square() {
        let mut raster = Raster::new(2, 1);
        raster.pixels_mut()[0] = [1.0, 0.0, 0.0, 1.0];
        raster.pixels_mut()[1] = [0.0, 0.0, 1.0, 1.0];

        assert_eq!(raster.sample(-3.0, 0.5), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(raster.sample(7.0, 0.5), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn luma_uses_rec601_weights() {
        let white = Raster::filled(4, 4, [1.0, 1.0, 1.0, 1.0]);
        assert!((white.luma_at(0.3, 0.8) - 1.0).abs() < 1.0e-6);
        assert!((luma([0.0, 1.0, 0.0]) - 0.587).abs() < 1.0e-6);
    }

    #[test]
    fn line_stays_inside_the_raster() {
        let mut raster = Raster::new(8, 8);
        raster.stroke_line([-4.0, 2.0], [20.0, 2.0], [0.5, 0.5, 0.5, 0.5]);
        let lit = raster.pixels().iter().filter(|px| px[3] > 0.0).count();
        assert_eq!(lit, 8);
    }

    #[test]
    fn rgba8_roundtrip_is_unpremultiplied() {
        let raster = Raster::from_rgba8(1, 1, &[200, 100, 50, 255]);
        assert_eq!(raster.to_rgba8(), vec![200, 100, 50, 255]);
    }
}
