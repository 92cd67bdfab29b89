use super::canvas::PixelRect;

pub const DEFAULT_ZOOM: f32 = 0.5;
pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 1.5;
pub const ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

fn clamp_zoom(scale: f32) -> f32 {
    if !scale.is_finite() {
        return DEFAULT_ZOOM;
    }
    scale.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Display scale applied to the tileset's native tile size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom(f32);

impl Default for Zoom {
    fn default() -> Self {
        Self(DEFAULT_ZOOM)
    }
}

impl Zoom {
    pub fn new(scale: f32) -> Self {
        Self(clamp_zoom(scale))
    }

    pub fn scale(self) -> f32 {
        self.0
    }

    /// Offsets the scale by `delta`, clamped. A non-finite delta is ignored.
    pub fn adjusted(self, delta: f32) -> Self {
        if !delta.is_finite() {
            return self;
        }
        Self::new(self.0 + delta)
    }
}

/// On-screen size of one tile in pixels at `zoom`.
pub fn scaled_tile_px(base_tile_size: u32, zoom: Zoom) -> f32 {
    base_tile_size as f32 * zoom.scale()
}

/// Number of whole tiles that fit in the viewport at `zoom`.
pub fn visible_window(viewport: Viewport, base_tile_size: u32, zoom: Zoom) -> Option<(i32, i32)> {
    let tile_px = scaled_tile_px(base_tile_size, zoom);
    if !(tile_px.is_finite() && tile_px > 0.0) {
        return None;
    }
    Some((
        (viewport.width as f32 / tile_px).floor() as i32,
        (viewport.height as f32 / tile_px).floor() as i32,
    ))
}

/// Maps between room coordinates and screen tiles for one render tick. The
/// player's tile sits at `floor(window / 2)` on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    tile_px: f32,
    window: (i32, i32),
    player: (i32, i32),
}

impl ViewTransform {
    pub fn new(
        viewport: Viewport,
        base_tile_size: u32,
        zoom: Zoom,
        player: (i32, i32),
    ) -> Option<Self> {
        let window = visible_window(viewport, base_tile_size, zoom)?;
        Some(Self {
            tile_px: scaled_tile_px(base_tile_size, zoom),
            window,
            player,
        })
    }

    pub fn tile_px(&self) -> f32 {
        self.tile_px
    }

    pub fn window_tiles(&self) -> (i32, i32) {
        self.window
    }

    fn half_window(&self) -> (i32, i32) {
        (self.window.0 / 2, self.window.1 / 2)
    }

    pub fn screen_tile_to_room(&self, sx: i32, sy: i32) -> (i32, i32) {
        let (half_w, half_h) = self.half_window();
        (
            self.player.0.saturating_sub(half_w).saturating_add(sx),
            self.player.1.saturating_sub(half_h).saturating_add(sy),
        )
    }

    pub fn room_to_screen_tile(&self, rx: i32, ry: i32) -> (i32, i32) {
        let (half_w, half_h) = self.half_window();
        (
            rx.saturating_sub(self.player.0).saturating_add(half_w),
            ry.saturating_sub(self.player.1).saturating_add(half_h),
        )
    }

    pub fn room_to_screen_px(&self, rx: i32, ry: i32) -> (f32, f32) {
        let (sx, sy) = self.room_to_screen_tile(rx, ry);
        (sx as f32 * self.tile_px, sy as f32 * self.tile_px)
    }

    pub fn is_on_screen(&self, sx: i32, sy: i32) -> bool {
        sx >= 0 && sy >= 0 && sx < self.window.0 && sy < self.window.1
    }

    /// Pixel rectangle of screen tile `(sx, sy)`. Edges are rounded so
    /// neighbouring tiles share a boundary without gaps.
    pub fn tile_rect(&self, sx: i32, sy: i32) -> PixelRect {
        tile_rect_at(sx, sy, self.tile_px)
    }
}

pub(crate) fn tile_rect_at(sx: i32, sy: i32, tile_px: f32) -> PixelRect {
    let edge = |index: i32| (index as f32 * tile_px).round() as i32;
    PixelRect {
        left: edge(sx),
        top: edge(sy),
        right: edge(sx + 1),
        bottom: edge(sy + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport { width, height }
    }

    #[test]
    fn zoom_clamps_and_resets_non_finite() {
        assert_eq!(Zoom::new(3.0).scale(), MAX_ZOOM);
        assert_eq!(Zoom::new(0.0).scale(), MIN_ZOOM);
        assert_eq!(Zoom::new(f32::NAN).scale(), DEFAULT_ZOOM);
        assert_eq!(Zoom::default().adjusted(f32::INFINITY), Zoom::default());
    }

    #[test]
    fn repeated_steps_settle_at_bounds() {
        let mut zoom = Zoom::default();
        for _ in 0..20 {
            zoom = zoom.adjusted(ZOOM_STEP);
        }
        assert_eq!(zoom.scale(), MAX_ZOOM);
        for _ in 0..20 {
            zoom = zoom.adjusted(-ZOOM_STEP);
        }
        assert_eq!(zoom.scale(), MIN_ZOOM);
    }

    #[test]
    fn large_adjustments_clamp_in_one_step() {
        let zoom = Zoom::new(0.5).adjusted(10.0);
        assert_eq!(zoom.scale(), MAX_ZOOM);
        assert_eq!(zoom.adjusted(-10.0).scale(), MIN_ZOOM);
    }

    #[test]
    fn player_sits_at_half_window() {
        // 32px tiles at 0.5 -> 16px; 800x600 -> 50x37 tiles.
        let transform =
            ViewTransform::new(viewport(800, 600), 32, Zoom::default(), (10, 20)).expect("t");
        assert_eq!(transform.window_tiles(), (50, 37));
        assert_eq!(transform.room_to_screen_tile(10, 20), (25, 18));
        assert_eq!(transform.room_to_screen_px(10, 20), (400.0, 288.0));
        assert_eq!(transform.screen_tile_to_room(0, 0), (-15, 2));
    }

    #[test]
    fn screen_and_room_tiles_round_trip() {
        let transform =
            ViewTransform::new(viewport(640, 480), 24, Zoom::new(0.75), (3, 4)).expect("t");
        for (sx, sy) in [(0, 0), (5, 9), (35, 26)] {
            let (rx, ry) = transform.screen_tile_to_room(sx, sy);
            assert_eq!(transform.room_to_screen_tile(rx, ry), (sx, sy));
        }
    }

    #[test]
    fn extreme_player_positions_saturate() {
        let transform =
            ViewTransform::new(viewport(800, 600), 32, Zoom::default(), (i32::MIN, i32::MAX))
                .expect("t");
        assert_eq!(transform.screen_tile_to_room(0, 36), (i32::MIN, i32::MAX));
        assert_eq!(
            transform.room_to_screen_tile(i32::MAX, i32::MIN),
            (i32::MAX, i32::MIN + 18)
        );
        assert!(!transform.is_on_screen(i32::MAX, i32::MIN));
    }

    #[test]
    fn fractional_tiles_leave_no_gaps() {
        let first = tile_rect_at(0, 0, 17.6);
        let second = tile_rect_at(1, 0, 17.6);
        assert_eq!(first.right, second.left);
        assert_eq!((second.left, second.right), (18, 35));
    }

    #[test]
    fn zero_tile_size_has_no_transform() {
        assert!(ViewTransform::new(viewport(100, 100), 0, Zoom::default(), (0, 0)).is_none());
    }
}
