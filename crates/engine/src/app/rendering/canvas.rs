pub type Rgba = [u8; 4];

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            right: left.saturating_add(width),
            bottom: top.saturating_add(height),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    fn clipped(self, width: u32, height: u32) -> Option<Self> {
        let clipped = Self {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(i32::try_from(width).unwrap_or(i32::MAX)),
            bottom: self.bottom.min(i32::try_from(height).unwrap_or(i32::MAX)),
        };
        (clipped.left < clipped.right && clipped.top < clipped.bottom).then_some(clipped)
    }
}

/// Source-over blend of `src` onto `dst`.
pub fn blend_rgba(dst: Rgba, src: Rgba) -> Rgba {
    let alpha = u32::from(src[3]);
    if alpha == 255 {
        return src;
    }
    if alpha == 0 {
        return dst;
    }
    let inv = 255 - alpha;
    let mix = |s: u8, d: u8| ((u32::from(s) * alpha + u32::from(d) * inv + 127) / 255) as u8;
    [
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (alpha + (u32::from(dst[3]) * inv + 127) / 255).min(255) as u8,
    ]
}

/// Drawing target over a borrowed RGBA8 buffer. Every write is clipped.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok().filter(|x| *x < self.width)? as usize;
        let y = u32::try_from(y).ok().filter(|y| *y < self.height)? as usize;
        let pixel = y.checked_mul(self.width as usize)?.checked_add(x)?;
        let byte = pixel.checked_mul(4)?;
        (byte.checked_add(4)? <= self.frame.len()).then_some(byte)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        let offset = self.offset(x, y)?;
        let mut color = [0; 4];
        color.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(color)
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(offset) = self.offset(x, y) {
            self.frame[offset..offset + 4].copy_from_slice(&color);
        }
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(offset) = self.offset(x, y) {
            let mut dst = [0; 4];
            dst.copy_from_slice(&self.frame[offset..offset + 4]);
            self.frame[offset..offset + 4].copy_from_slice(&blend_rgba(dst, color));
        }
    }

    pub fn clear(&mut self, color: Rgba) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let Some(rect) = rect.clipped(self.width, self.height) else {
            return;
        };
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.put_pixel(x, y, color);
            }
        }
    }

    pub fn blend_rect(&mut self, rect: PixelRect, color: Rgba) {
        let Some(rect) = rect.clipped(self.width, self.height) else {
            return;
        };
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.blend_pixel(x, y, color);
            }
        }
    }

    /// Nearest-neighbour scales `src_rect` of an RGBA8 image with row width
    /// `src_width` into `dst`, blending translucent texels.
    pub fn blit_scaled(&mut self, src: &[u8], src_width: u32, src_rect: PixelRect, dst: PixelRect) {
        let (dst_w, dst_h) = (dst.width(), dst.height());
        let (src_w, src_h) = (src_rect.width(), src_rect.height());
        if dst_w <= 0 || dst_h <= 0 || src_w <= 0 || src_h <= 0 {
            return;
        }
        let Some(visible) = dst.clipped(self.width, self.height) else {
            return;
        };

        for out_y in visible.top..visible.bottom {
            let src_y = src_rect.top + (out_y - dst.top) * src_h / dst_h;
            for out_x in visible.left..visible.right {
                let src_x = src_rect.left + (out_x - dst.left) * src_w / dst_w;
                let Some(texel) = read_texel(src, src_width, src_x, src_y) else {
                    continue;
                };
                self.blend_pixel(out_x, out_y, texel);
            }
        }
    }

    /// Fills a disc whose alpha falls off linearly from `color` at the centre
    /// to transparent at `radius`.
    pub fn radial_gradient(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        if !(radius.is_finite() && radius > 0.0 && cx.is_finite() && cy.is_finite()) {
            return;
        }
        let bounds = PixelRect {
            left: (cx - radius).floor() as i32,
            top: (cy - radius).floor() as i32,
            right: (cx + radius).ceil() as i32 + 1,
            bottom: (cy + radius).ceil() as i32 + 1,
        };
        let Some(bounds) = bounds.clipped(self.width, self.height) else {
            return;
        };

        for y in bounds.top..bounds.bottom {
            for x in bounds.left..bounds.right {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t >= 1.0 {
                    continue;
                }
                let alpha = (f32::from(color[3]) * (1.0 - t)).round() as u8;
                self.blend_pixel(x, y, [color[0], color[1], color[2], alpha]);
            }
        }
    }

    /// Blends an owned surface with its top-left corner at `(left, top)`.
    pub fn draw_surface(&mut self, surface: &Surface, left: i32, top: i32) {
        for y in 0..surface.height as i32 {
            for x in 0..surface.width as i32 {
                if let Some(texel) = read_texel(&surface.rgba, surface.width, x, y) {
                    self.blend_pixel(left + x, top + y, texel);
                }
            }
        }
    }
}

fn read_texel(src: &[u8], src_width: u32, x: i32, y: i32) -> Option<Rgba> {
    let x = u32::try_from(x).ok().filter(|x| *x < src_width)? as usize;
    let y = usize::try_from(y).ok()?;
    let offset = y
        .checked_mul(src_width as usize)?
        .checked_add(x)?
        .checked_mul(4)?;
    let texel = src.get(offset..offset + 4)?;
    Some([texel[0], texel[1], texel[2], texel[3]])
}

/// Owned RGBA8 buffer that persists between render ticks.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&mut self) -> Canvas<'_> {
        Canvas::new(&mut self.rgba, self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width {
            return None;
        }
        read_texel(&self.rgba, self.width, x as i32, y as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [255, 255, 255, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    #[test]
    fn half_alpha_black_darkens_white_to_mid_grey() {
        let blended = blend_rgba(WHITE, [0, 0, 0, 128]);
        assert_eq!(blended, [127, 127, 127, 255]);
        assert_eq!(blend_rgba(WHITE, [0, 0, 0, 0]), WHITE);
    }

    #[test]
    fn fill_rect_is_clipped_to_canvas() {
        let mut buffer = vec![0; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 4);
        canvas.fill_rect(PixelRect::new(-2, 2, 4, 10), WHITE);

        assert_eq!(canvas.pixel(0, 2), Some(WHITE));
        assert_eq!(canvas.pixel(1, 3), Some(WHITE));
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(0, 4), None);
    }

    #[test]
    fn blit_scales_up_and_skips_transparent_texels() {
        // 2x1 source: opaque red, fully transparent.
        let src = [255, 0, 0, 255, 9, 9, 9, 0];
        let mut buffer = vec![0; 4 * 2 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 2);
        canvas.clear(BLACK);
        canvas.blit_scaled(&src, 2, PixelRect::new(0, 0, 2, 1), PixelRect::new(0, 0, 4, 2));

        assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(2, 0), Some(BLACK));
        assert_eq!(canvas.pixel(3, 1), Some(BLACK));
    }

    #[test]
    fn radial_gradient_fades_towards_edge() {
        let mut buffer = vec![0; 21 * 21 * 4];
        let mut canvas = Canvas::new(&mut buffer, 21, 21);
        canvas.clear(BLACK);
        canvas.radial_gradient(10.5, 10.5, 10.0, [200, 0, 0, 128]);

        let centre = canvas.pixel(10, 10).expect("centre");
        let near_edge = canvas.pixel(19, 10).expect("edge");
        let corner = canvas.pixel(0, 0).expect("corner");
        assert!(centre[0] > near_edge[0]);
        assert!(near_edge[0] > 0);
        assert_eq!(corner, BLACK);
    }

    #[test]
    fn surface_composites_with_alpha() {
        let mut surface = Surface::new(2, 1);
        surface.canvas().put_pixel(0, 0, [0, 255, 0, 255]);

        let mut buffer = vec![0; 3 * 1 * 4];
        let mut canvas = Canvas::new(&mut buffer, 3, 1);
        canvas.clear(WHITE);
        canvas.draw_surface(&surface, 1, 0);

        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
        assert_eq!(canvas.pixel(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(canvas.pixel(2, 0), Some(WHITE));
    }
}
