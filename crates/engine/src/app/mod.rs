mod input;
mod loop_runner;
mod rendering;

pub use input::{waypoint_offset, InputAction, InputCommand, KeyChord, WaypointMapper};
pub use loop_runner::{run_app, run_app_with_connector, AppError, ClientConfig, ClientSession};
pub use rendering::{
    blend_rgba, draw_room_snapshot, needs_fov_dim, render_viewport, scaled_tile_px,
    visible_window, AtlasError, Canvas, HudState, Minimap, MinimapWork, PixelRect, RenderJob,
    RenderQueue, RenderSkip, Renderer, Rgba, Surface, TileAtlas, TileGraphics, ViewTransform,
    Viewport, ViewportScene, WindowRect, Zoom, CURSOR_COLOR, DEFAULT_MINIMAP_SIZE, DEFAULT_ZOOM,
    FOV_DIM_COLOR, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP,
};
