use std::collections::HashMap;

use tracing::{debug, warn};

use crate::net::{RoomId, ViewportFrame};

/// Index into the tileset. Terrain index 0 means "not yet seen".
pub type TileIndex = u32;

/// Everything the player has learned about one room's terrain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMap {
    width: u32,
    height: u32,
    cells: Vec<Option<TileIndex>>,
}

impl RoomMap {
    fn new(width: u32, height: u32) -> Self {
        let len = (width as usize).saturating_mul(height as usize);
        Self {
            width,
            height,
            cells: vec![None; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok().filter(|x| *x < self.width)?;
        let y = u32::try_from(y).ok().filter(|y| *y < self.height)?;
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Known terrain at `(x, y)`; `None` when unknown or out of bounds.
    pub fn get(&self, x: i32, y: i32) -> Option<TileIndex> {
        self.offset(x, y).and_then(|offset| self.cells[offset])
    }

    /// All known cells in row-major order.
    pub fn known_cells(&self) -> impl Iterator<Item = (u32, u32, TileIndex)> + '_ {
        let width = self.width.max(1);
        self.cells.iter().enumerate().filter_map(move |(offset, cell)| {
            let index = (*cell)?;
            let offset = offset as u32;
            Some((offset % width, offset / width, index))
        })
    }

    pub fn known_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchSummary {
    pub room_created: bool,
    pub cells_written: usize,
}

/// Per-room accumulation of known terrain. Cells only ever go from unknown to
/// known; an unknown cell in a frame never erases what was learned before.
#[derive(Debug, Default)]
pub struct MapStore {
    rooms: HashMap<RoomId, RoomMap>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the known terrain of `frame` into its room, allocating the room
    /// from the frame's declared dimensions the first time it is seen.
    /// Frames failing [`ViewportFrame::check_bounds`] are skipped.
    pub fn patch(&mut self, frame: &ViewportFrame) -> PatchSummary {
        let mut summary = PatchSummary::default();
        if let Err(error) = frame.check_bounds() {
            warn!(room = %frame.room, error = %error, "map_frame_rejected");
            return summary;
        }
        let room = self.rooms.entry(frame.room.clone()).or_insert_with(|| {
            summary.room_created = true;
            debug!(
                room = %frame.room,
                width = frame.width,
                height = frame.height,
                "map_room_allocated"
            );
            RoomMap::new(frame.width, frame.height)
        });

        let (cols, rows) = frame.window_size();
        let (origin_x, origin_y) = frame.window_origin();
        let room_w = i32::try_from(room.width).unwrap_or(i32::MAX);
        let room_h = i32::try_from(room.height).unwrap_or(i32::MAX);

        let min_x = origin_x.max(0);
        let max_x = origin_x.saturating_add(cols).min(room_w);
        let min_y = origin_y.max(0);
        let max_y = origin_y.saturating_add(rows).min(room_h);

        for ry in min_y..max_y {
            for rx in min_x..max_x {
                let Some(index) = frame
                    .cell(rx.saturating_sub(origin_x), ry.saturating_sub(origin_y))
                    .and_then(|cell| cell.known_terrain())
                else {
                    continue;
                };
                let Some(offset) = room.offset(rx, ry) else {
                    continue;
                };
                room.cells[offset] = Some(index);
                summary.cells_written += 1;
            }
        }

        summary
    }

    /// Stored grid for `room`, used to repaint immediately on re-entry.
    pub fn redraw(&self, room: &RoomId) -> Option<&RoomMap> {
        self.rooms.get(room)
    }
}
