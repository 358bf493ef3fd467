use fractile_core::ScreenRect;

use crate::error::SurfaceError;

/// RGBA pixel.
pub type Rgba = [u8; 4];

/// Color map function type - converts an iteration count (and the solver's
/// iteration ceiling) to RGBA.
pub type ColorMap = fn(u32, u32) -> Rgba;

/// Escaping points fade from white to black; interior points are black.
pub fn grayscale(iterations: u32, max_iterations: u32) -> Rgba {
    let max = max_iterations.max(1) as i64;
    let v = (255 - iterations as i64 * 256 / max).clamp(0, 255) as u8;
    [v, v, v, 255]
}

/// Warm ramp through red and yellow; interior points are black.
pub fn ember(iterations: u32, max_iterations: u32) -> Rgba {
    let max = max_iterations.max(1) as i64;
    if iterations as i64 >= max {
        return [0, 0, 0, 255];
    }
    let t = (iterations as i64 * 512 / max).min(511);
    if t < 256 {
        [t as u8, (t / 4) as u8, 0, 255]
    } else {
        [255, (t - 256).min(255) as u8, (t / 8) as u8, 255]
    }
}

/// Sub-rectangle of a texture in normalized coordinates. Ancestor-fallback
/// draws use this to show just the window of a coarse texture that overlaps
/// a finer tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f64,
    pub v0: f64,
    pub u1: f64,
    pub v1: f64,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    pub fn new(u0: f64, v0: f64, u1: f64, v1: f64) -> Self {
        Self { u0, v0, u1, v1 }
    }
}

/// Where tiles end up on screen. Texture creation can fail (video memory is
/// finite); drawing into the current frame cannot.
pub trait Surface {
    type Texture;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self::Texture, SurfaceError>;

    fn draw_texture(&mut self, texture: &Self::Texture, dest: ScreenRect, uv: UvRect);

    fn fill_rect(&mut self, dest: ScreenRect, color: Rgba);

    fn destroy_texture(&mut self, texture: Self::Texture);
}

/// Handle to a texture held by a [`SoftSurface`].
#[derive(Debug, PartialEq, Eq)]
pub struct SoftTexture(usize);

#[derive(Debug)]
struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// CPU framebuffer surface. Backs the headless renderer and the tests;
/// draws with nearest-neighbour sampling and clips against the frame.
///
/// An optional texture budget makes `create_texture` fail once the given
/// number of textures is live, which is how tests exercise upload-failure
/// handling.
pub struct SoftSurface {
    width: u32,
    height: u32,
    frame: Vec<u8>,
    textures: Vec<Option<TextureData>>,
    free: Vec<usize>,
    live: usize,
    texture_budget: Option<usize>,
}

impl SoftSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: vec![0; (width * height * 4) as usize],
            textures: Vec::new(),
            free: Vec::new(),
            live: 0,
            texture_budget: None,
        }
    }

    pub fn with_texture_budget(width: u32, height: u32, budget: usize) -> Self {
        let mut surface = Self::new(width, height);
        surface.texture_budget = Some(budget);
        surface
    }

    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA frame, row-major.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        debug_assert!(x < self.width && y < self.height);
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.frame[i],
            self.frame[i + 1],
            self.frame[i + 2],
            self.frame[i + 3],
        ]
    }

    pub fn live_textures(&self) -> usize {
        self.live
    }

    pub fn clear(&mut self, color: Rgba) {
        for px in self.frame.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    /// Integer pixel span covered by `dest` after clipping to the frame.
    fn clip_span(&self, dest: ScreenRect) -> Option<(u32, u32, u32, u32)> {
        if dest.is_empty() {
            return None;
        }
        let x0 = dest.left.floor().max(0.0) as u32;
        let y0 = dest.top.floor().max(0.0) as u32;
        let x1 = dest.right.ceil().min(self.width as f64) as u32;
        let y1 = dest.bottom.ceil().min(self.height as f64) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

impl Surface for SoftSurface {
    type Texture = SoftTexture;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<SoftTexture, SurfaceError> {
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            return Err(SurfaceError::BufferSize {
                width,
                height,
                len: pixels.len(),
            });
        }
        if let Some(budget) = self.texture_budget {
            if self.live >= budget {
                return Err(SurfaceError::TextureLimit(self.live));
            }
        }
        let data = TextureData {
            width,
            height,
            pixels: pixels.to_vec(),
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.textures[index] = Some(data);
                index
            }
            None => {
                self.textures.push(Some(data));
                self.textures.len() - 1
            }
        };
        self.live += 1;
        Ok(SoftTexture(index))
    }

    fn draw_texture(&mut self, texture: &SoftTexture, dest: ScreenRect, uv: UvRect) {
        let Some((x0, y0, x1, y1)) = self.clip_span(dest) else {
            return;
        };
        let Some(tex) = self.textures.get(texture.0).and_then(|t| t.as_ref()) else {
            return;
        };
        let dest_w = dest.right - dest.left;
        let dest_h = dest.bottom - dest.top;
        for y in y0..y1 {
            let ty = (y as f64 + 0.5 - dest.top) / dest_h;
            let v = uv.v0 + ty * (uv.v1 - uv.v0);
            let sy = ((v * tex.height as f64) as i64).clamp(0, tex.height as i64 - 1) as usize;
            for x in x0..x1 {
                let tx = (x as f64 + 0.5 - dest.left) / dest_w;
                let u = uv.u0 + tx * (uv.u1 - uv.u0);
                let sx = ((u * tex.width as f64) as i64).clamp(0, tex.width as i64 - 1) as usize;
                let src = (sy * tex.width as usize + sx) * 4;
                let dst = ((y * self.width + x) * 4) as usize;
                self.frame[dst..dst + 4].copy_from_slice(&tex.pixels[src..src + 4]);
            }
        }
    }

    fn fill_rect(&mut self, dest: ScreenRect, color: Rgba) {
        let Some((x0, y0, x1, y1)) = self.clip_span(dest) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let dst = ((y * self.width + x) * 4) as usize;
                self.frame[dst..dst + 4].copy_from_slice(&color);
            }
        }
    }

    fn destroy_texture(&mut self, texture: SoftTexture) {
        if let Some(slot) = self.textures.get_mut(texture.0) {
            if slot.take().is_some() {
                self.free.push(texture.0);
                self.live -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_pixels(width: u32, height: u32, color: Rgba) -> Vec<u8> {
        color
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect()
    }

    // ===== Color maps =====

    #[test]
    fn grayscale_interior_is_black() {
        assert_eq!(grayscale(2048, 2048), [0, 0, 0, 255]);
    }

    #[test]
    fn grayscale_instant_escape_is_white() {
        assert_eq!(grayscale(0, 2048), [255, 255, 255, 255]);
    }

    #[test]
    fn grayscale_fades_with_iterations() {
        let bright = grayscale(8, 2048)[0];
        let dim = grayscale(1024, 2048)[0];
        assert!(bright > dim);
    }

    #[test]
    fn ember_interior_is_black() {
        assert_eq!(ember(100, 100), [0, 0, 0, 255]);
    }

    // ===== Texture lifecycle =====

    #[test]
    fn create_rejects_wrong_buffer_size() {
        let mut surface = SoftSurface::new(16, 16);
        let err = surface.create_texture(4, 4, &[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::BufferSize {
                width: 4,
                height: 4,
                len: 10
            }
        );
    }

    #[test]
    fn budget_limits_live_textures() {
        let mut surface = SoftSurface::with_texture_budget(16, 16, 1);
        let pixels = solid_pixels(2, 2, [1, 2, 3, 255]);
        let first = surface.create_texture(2, 2, &pixels).unwrap();
        let err = surface.create_texture(2, 2, &pixels).unwrap_err();
        assert_eq!(err, SurfaceError::TextureLimit(1));

        // Destroying frees the budget slot.
        surface.destroy_texture(first);
        assert!(surface.create_texture(2, 2, &pixels).is_ok());
    }

    #[test]
    fn destroy_recycles_slots() {
        let mut surface = SoftSurface::new(8, 8);
        let pixels = solid_pixels(1, 1, [9, 9, 9, 255]);
        let a = surface.create_texture(1, 1, &pixels).unwrap();
        surface.destroy_texture(a);
        assert_eq!(surface.live_textures(), 0);
        let _b = surface.create_texture(1, 1, &pixels).unwrap();
        assert_eq!(surface.live_textures(), 1);
    }

    // ===== Drawing =====

    #[test]
    fn fill_rect_writes_pixels() {
        let mut surface = SoftSurface::new(8, 8);
        surface.fill_rect(ScreenRect::new(2.0, 2.0, 4.0, 4.0), [10, 20, 30, 255]);
        assert_eq!(surface.pixel(2, 2), [10, 20, 30, 255]);
        assert_eq!(surface.pixel(3, 3), [10, 20, 30, 255]);
        assert_eq!(surface.pixel(4, 4), [0, 0, 0, 0]);
        assert_eq!(surface.pixel(1, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn fill_rect_clips_to_frame() {
        let mut surface = SoftSurface::new(4, 4);
        surface.fill_rect(ScreenRect::new(-10.0, -10.0, 100.0, 100.0), [5, 5, 5, 255]);
        assert_eq!(surface.pixel(0, 0), [5, 5, 5, 255]);
        assert_eq!(surface.pixel(3, 3), [5, 5, 5, 255]);
    }

    #[test]
    fn draw_texture_stretches_over_dest() {
        let mut surface = SoftSurface::new(8, 8);
        let pixels = solid_pixels(2, 2, [100, 0, 0, 255]);
        let tex = surface.create_texture(2, 2, &pixels).unwrap();
        surface.draw_texture(&tex, ScreenRect::new(0.0, 0.0, 8.0, 8.0), UvRect::FULL);
        assert_eq!(surface.pixel(0, 0), [100, 0, 0, 255]);
        assert_eq!(surface.pixel(7, 7), [100, 0, 0, 255]);
    }

    #[test]
    fn draw_texture_samples_uv_window() {
        let mut surface = SoftSurface::new(4, 4);
        // 2x2 texture: left column red, right column blue.
        let pixels = vec![
            255, 0, 0, 255, 0, 0, 255, 255, //
            255, 0, 0, 255, 0, 0, 255, 255,
        ];
        let tex = surface.create_texture(2, 2, &pixels).unwrap();

        // Draw only the right half of the texture across the full frame.
        let uv = UvRect::new(0.5, 0.0, 1.0, 1.0);
        surface.draw_texture(&tex, ScreenRect::new(0.0, 0.0, 4.0, 4.0), uv);
        assert_eq!(surface.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(surface.pixel(3, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn draw_offscreen_is_a_no_op() {
        let mut surface = SoftSurface::new(4, 4);
        let pixels = solid_pixels(1, 1, [50, 50, 50, 255]);
        let tex = surface.create_texture(1, 1, &pixels).unwrap();
        surface.draw_texture(
            &tex,
            ScreenRect::new(-20.0, -20.0, -10.0, -10.0),
            UvRect::FULL,
        );
        assert!(surface.frame().iter().all(|&b| b == 0));
    }
}
