mod atlas;
mod canvas;
mod minimap;
mod queue;
mod renderer;
mod transform;
mod viewport;

pub use atlas::{AtlasError, TileAtlas, TileGraphics};
pub use canvas::{blend_rgba, Canvas, PixelRect, Rgba, Surface};
pub use minimap::{Minimap, DEFAULT_MINIMAP_SIZE};
pub use queue::{MinimapWork, RenderJob, RenderQueue, WindowRect};
pub use renderer::{HudState, Renderer};
pub use transform::{
    scaled_tile_px, visible_window, ViewTransform, Viewport, Zoom, DEFAULT_ZOOM, MAX_ZOOM,
    MIN_ZOOM, ZOOM_STEP,
};
pub use viewport::{
    draw_room_snapshot, needs_fov_dim, render_viewport, RenderSkip, ViewportScene, CURSOR_COLOR,
    FOV_DIM_COLOR,
};
