use super::atlas::TileGraphics;
use super::canvas::{Canvas, Rgba};
use super::transform::{scaled_tile_px, tile_rect_at, ViewTransform, Viewport, Zoom};
use crate::map_store::{MapStore, RoomMap};
use crate::net::ViewportFrame;

pub const BACKGROUND_COLOR: Rgba = [0, 0, 0, 255];
pub const FOV_DIM_COLOR: Rgba = [0, 0, 0, 128];
pub const CURSOR_COLOR: Rgba = [200, 0, 0, 128];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSkip {
    /// The frame's room has no stored grid yet.
    MissingRoom,
    /// Tile size or zoom leaves no drawable tile.
    NoTileSize,
}

/// Inputs for one viewport render tick.
#[derive(Debug, Clone, Copy)]
pub struct ViewportScene<'a> {
    pub frame: &'a ViewportFrame,
    pub maps: &'a MapStore,
    pub zoom: Zoom,
    pub cursor: Option<(f32, f32)>,
}

/// Repaints the whole viewport: remembered terrain, live cells in view, the
/// field-of-view dimming, then the waypoint cursor.
pub fn render_viewport(
    canvas: &mut Canvas<'_>,
    graphics: &TileGraphics,
    scene: &ViewportScene<'_>,
) -> Result<(), RenderSkip> {
    let room = scene
        .maps
        .redraw(&scene.frame.room)
        .ok_or(RenderSkip::MissingRoom)?;
    let viewport = Viewport {
        width: canvas.width(),
        height: canvas.height(),
    };
    let transform = ViewTransform::new(
        viewport,
        graphics.tile_size(),
        scene.zoom,
        (scene.frame.x, scene.frame.y),
    )
    .ok_or(RenderSkip::NoTileSize)?;

    canvas.clear(BACKGROUND_COLOR);
    draw_terrain_pass(canvas, graphics, &transform, room);
    draw_live_pass(canvas, graphics, &transform, scene.frame);
    draw_fov_pass(canvas, &transform, scene.frame);
    if let Some((x, y)) = scene.cursor {
        draw_cursor(canvas, x, y, transform.tile_px());
    }
    Ok(())
}

fn draw_terrain_pass(
    canvas: &mut Canvas<'_>,
    graphics: &TileGraphics,
    transform: &ViewTransform,
    room: &RoomMap,
) {
    let (cols, rows) = transform.window_tiles();
    for sy in 0..rows {
        for sx in 0..cols {
            let (rx, ry) = transform.screen_tile_to_room(sx, sy);
            if let Some(index) = room.get(rx, ry) {
                graphics.draw_tile(canvas, index, transform.tile_rect(sx, sy));
            }
        }
    }
}

fn draw_live_pass(
    canvas: &mut Canvas<'_>,
    graphics: &TileGraphics,
    transform: &ViewTransform,
    frame: &ViewportFrame,
) {
    let (origin_x, origin_y) = frame.window_origin();
    for (wy, row) in frame.cells.iter().enumerate() {
        for (wx, cell) in row.iter().enumerate() {
            if !cell.in_fov {
                continue;
            }
            let rx = origin_x.saturating_add(i32::try_from(wx).unwrap_or(i32::MAX));
            let ry = origin_y.saturating_add(i32::try_from(wy).unwrap_or(i32::MAX));
            let (sx, sy) = transform.room_to_screen_tile(rx, ry);
            if !transform.is_on_screen(sx, sy) {
                continue;
            }
            let rect = transform.tile_rect(sx, sy);
            if let Some(terrain) = cell.known_terrain() {
                graphics.draw_tile(canvas, terrain, rect);
            }
            for object in cell.object_tiles() {
                graphics.draw_tile(canvas, object, rect);
            }
        }
    }
}

/// A screen tile is dimmed when it falls outside the frame window or the
/// frame marks it out of view. Each tile is dimmed at most once.
pub fn needs_fov_dim(transform: &ViewTransform, frame: &ViewportFrame, sx: i32, sy: i32) -> bool {
    let (rx, ry) = transform.screen_tile_to_room(sx, sy);
    if !frame.window_contains(rx, ry) {
        return true;
    }
    !frame.cell_at_room(rx, ry).is_some_and(|cell| cell.in_fov)
}

fn draw_fov_pass(canvas: &mut Canvas<'_>, transform: &ViewTransform, frame: &ViewportFrame) {
    let (cols, rows) = transform.window_tiles();
    for sy in 0..rows {
        for sx in 0..cols {
            if needs_fov_dim(transform, frame, sx, sy) {
                canvas.blend_rect(transform.tile_rect(sx, sy), FOV_DIM_COLOR);
            }
        }
    }
}

pub fn draw_cursor(canvas: &mut Canvas<'_>, x: f32, y: f32, tile_px: f32) {
    canvas.radial_gradient(x, y, tile_px, CURSOR_COLOR);
}

/// Paints a stored room grid from the top-left corner: known cells as tiles,
/// everything else left black. Used right after entering a room, before the
/// first frame for it arrives.
pub fn draw_room_snapshot(
    canvas: &mut Canvas<'_>,
    graphics: &TileGraphics,
    room: &RoomMap,
    zoom: Zoom,
) -> Result<(), RenderSkip> {
    let tile_px = scaled_tile_px(graphics.tile_size(), zoom);
    if !(tile_px.is_finite() && tile_px > 0.0) {
        return Err(RenderSkip::NoTileSize);
    }
    canvas.clear(BACKGROUND_COLOR);
    for (x, y, index) in room.known_cells() {
        graphics.draw_tile(canvas, index, tile_rect_at(x as i32, y as i32, tile_px));
    }
    Ok(())
}
