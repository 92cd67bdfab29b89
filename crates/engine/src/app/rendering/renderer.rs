use std::rc::Rc;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use tracing::debug;
use winit::window::Window;

use super::atlas::TileGraphics;
use super::canvas::{Canvas, PixelRect, Rgba};
use super::minimap::Minimap;
use super::queue::{MinimapWork, RenderJob};
use super::transform::{Viewport, Zoom};
use super::viewport::{
    draw_room_snapshot, render_viewport, RenderSkip, ViewportScene, BACKGROUND_COLOR,
};
use crate::map_store::MapStore;
use crate::net::{PlayerStats, RoomId, ViewportFrame};

const MINIMAP_MARGIN_PX: i32 = 8;
const HEALTH_BAR_HEIGHT_PX: i32 = 6;
const HEALTH_BAR_MARGIN_PX: i32 = 8;
const HEALTH_BAR_BACK_COLOR: Rgba = [70, 12, 12, 220];
const HEALTH_BAR_FILL_COLOR: Rgba = [200, 32, 32, 255];

/// Per-tick state owned by the loop rather than the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct HudState {
    pub zoom: Zoom,
    pub cursor: Option<(f32, f32)>,
    pub stats: Option<PlayerStats>,
}

/// What the viewport shows between ticks.
#[derive(Debug, Clone)]
enum ViewContent {
    Empty,
    Frame(Rc<ViewportFrame>),
    RoomSnapshot(RoomId),
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    graphics: TileGraphics,
    minimap: Minimap,
    content: ViewContent,
    last_skip: Option<RenderSkip>,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        graphics: TileGraphics,
        minimap_size: u32,
    ) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            graphics,
            minimap: Minimap::new(minimap_size),
            content: ViewContent::Empty,
            last_skip: None,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn tile_size(&self) -> u32 {
        self.graphics.tile_size()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Folds queued work into the retained view state.
    pub fn apply(&mut self, job: RenderJob, maps: &MapStore) {
        if let Some(room) = job.entered_room {
            self.content = ViewContent::RoomSnapshot(room);
        }
        if let Some(frame) = job.frame {
            self.content = ViewContent::Frame(frame);
        }
        match job.minimap {
            Some(MinimapWork::FullRedraw(room)) => match maps.redraw(&room) {
                Some(grid) => self.minimap.redraw_room(&self.graphics, &room, grid),
                None => self.minimap.clear(),
            },
            Some(MinimapWork::Overlay(windows)) => {
                for window in &windows {
                    self.minimap.overlay_window(&self.graphics, maps, window);
                }
            }
            None => {}
        }
    }

    pub fn render(&mut self, maps: &MapStore, hud: &HudState) -> Result<(), Error> {
        let Viewport { width, height } = self.viewport;
        let mut canvas = Canvas::new(self.pixels.frame_mut(), width, height);

        let outcome = match &self.content {
            ViewContent::Empty => {
                canvas.clear(BACKGROUND_COLOR);
                Ok(())
            }
            ViewContent::Frame(frame) => {
                let scene = ViewportScene {
                    frame,
                    maps,
                    zoom: hud.zoom,
                    cursor: hud.cursor,
                };
                render_viewport(&mut canvas, &self.graphics, &scene)
            }
            ViewContent::RoomSnapshot(room) => match maps.redraw(room) {
                Some(grid) => draw_room_snapshot(&mut canvas, &self.graphics, grid, hud.zoom),
                None => {
                    canvas.clear(BACKGROUND_COLOR);
                    Ok(())
                }
            },
        };
        match outcome {
            Ok(()) => self.last_skip = None,
            Err(skip) => {
                if self.last_skip != Some(skip) {
                    debug!(reason = ?skip, "render_skipped");
                }
                self.last_skip = Some(skip);
            }
        }

        let minimap = self.minimap.surface();
        let minimap_left = width as i32 - minimap.width() as i32 - MINIMAP_MARGIN_PX;
        canvas.draw_surface(minimap, minimap_left, MINIMAP_MARGIN_PX);
        if let Some(stats) = hud.stats {
            draw_health_bar(&mut canvas, stats);
        }

        self.pixels.render()
    }
}

fn draw_health_bar(canvas: &mut Canvas<'_>, stats: PlayerStats) {
    let width = (canvas.width() as i32 / 3).max(1);
    let top = canvas.height() as i32 - HEALTH_BAR_MARGIN_PX - HEALTH_BAR_HEIGHT_PX;
    let back = PixelRect::new(HEALTH_BAR_MARGIN_PX, top, width, HEALTH_BAR_HEIGHT_PX);
    canvas.blend_rect(back, HEALTH_BAR_BACK_COLOR);

    let filled = (width as f32 * stats.health_fraction()).round() as i32;
    if filled > 0 {
        canvas.fill_rect(
            PixelRect::new(HEALTH_BAR_MARGIN_PX, top, filled, HEALTH_BAR_HEIGHT_PX),
            HEALTH_BAR_FILL_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_bar_fill_tracks_fraction() {
        let mut buffer = vec![0; 60 * 30 * 4];
        let mut canvas = Canvas::new(&mut buffer, 60, 30);
        draw_health_bar(&mut canvas, PlayerStats { hp: 5, max_hp: 10 });

        let row = 30 - HEALTH_BAR_MARGIN_PX - 1;
        // Bar spans x 8..28; half of it is filled.
        assert_eq!(canvas.pixel(8, row), Some(HEALTH_BAR_FILL_COLOR));
        assert_eq!(canvas.pixel(17, row), Some(HEALTH_BAR_FILL_COLOR));
        assert_ne!(canvas.pixel(18, row), Some(HEALTH_BAR_FILL_COLOR));
        assert_eq!(canvas.pixel(40, row), Some([0, 0, 0, 0]));
    }

    #[test]
    fn empty_health_draws_only_background() {
        let mut buffer = vec![0; 30 * 30 * 4];
        let mut canvas = Canvas::new(&mut buffer, 30, 30);
        draw_health_bar(&mut canvas, PlayerStats { hp: 0, max_hp: 10 });

        let row = 30 - HEALTH_BAR_MARGIN_PX - 1;
        assert_ne!(canvas.pixel(8, row), Some(HEALTH_BAR_FILL_COLOR));
        assert_ne!(canvas.pixel(8, row), Some([0, 0, 0, 0]));
    }
}
