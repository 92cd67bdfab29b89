use tracing::debug;

use super::atlas::TileGraphics;
use super::canvas::{PixelRect, Surface};
use super::queue::WindowRect;
use crate::map_store::{MapStore, RoomMap};
use crate::net::RoomId;

pub const DEFAULT_MINIMAP_SIZE: u32 = 200;

/// Persistent overview of the current room, one colored block per known cell.
/// Scale is the surface width divided by the room width.
#[derive(Debug, Clone)]
pub struct Minimap {
    surface: Surface,
    room: Option<RoomId>,
}

impl Minimap {
    pub fn new(size: u32) -> Self {
        Self {
            surface: Surface::new(size, size),
            room: None,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn clear(&mut self) {
        self.surface.canvas().clear([0, 0, 0, 0]);
        self.room = None;
    }

    fn scale_for(&self, room: &RoomMap) -> Option<f32> {
        (room.width() > 0).then(|| self.surface.width() as f32 / room.width() as f32)
    }

    fn cell_rect(x: i32, y: i32, scale: f32) -> PixelRect {
        let left = (x as f32 * scale).floor() as i32;
        let top = (y as f32 * scale).floor() as i32;
        let right = ((x + 1) as f32 * scale).floor() as i32;
        let bottom = ((y + 1) as f32 * scale).floor() as i32;
        PixelRect {
            left,
            top,
            right: right.max(left + 1),
            bottom: bottom.max(top + 1),
        }
    }

    /// Clears and repaints every known cell of `room`.
    pub fn redraw_room(&mut self, graphics: &TileGraphics, room_id: &RoomId, room: &RoomMap) {
        self.clear();
        self.room = Some(room_id.clone());
        let Some(scale) = self.scale_for(room) else {
            return;
        };
        let mut canvas = self.surface.canvas();
        for (x, y, index) in room.known_cells() {
            if let Some(color) = graphics.minimap_color(index) {
                canvas.fill_rect(Self::cell_rect(x as i32, y as i32, scale), color);
            }
        }
    }

    /// Paints the known cells inside one frame window. A window for another
    /// room triggers a full redraw of that room instead.
    pub fn overlay_window(&mut self, graphics: &TileGraphics, maps: &MapStore, window: &WindowRect) {
        let Some(room) = maps.redraw(&window.room) else {
            return;
        };
        if self.room.as_ref() != Some(&window.room) {
            debug!(room = %window.room, "minimap_room_changed");
            self.redraw_room(graphics, &window.room, room);
            return;
        }
        let Some(scale) = self.scale_for(room) else {
            return;
        };

        let mut canvas = self.surface.canvas();
        let (origin_x, origin_y) = window.origin;
        for ry in origin_y..origin_y.saturating_add(window.size.1) {
            for rx in origin_x..origin_x.saturating_add(window.size.0) {
                let Some(color) = room.get(rx, ry).and_then(|index| graphics.minimap_color(index))
                else {
                    continue;
                };
                canvas.fill_rect(Self::cell_rect(rx, ry, scale), color);
            }
        }
    }
}
