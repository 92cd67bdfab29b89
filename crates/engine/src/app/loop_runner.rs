use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::input::{InputAction, InputCommand, KeyChord, WaypointMapper};
use super::rendering::{
    HudState, RenderQueue, Renderer, TileGraphics, Zoom, DEFAULT_MINIMAP_SIZE, ZOOM_STEP,
};
use crate::activity_log::DEFAULT_LOG_LIMIT;
use crate::net::{
    ConnectionListener, ConnectionState, Connector, Event as NetEvent, EventKind, PlayerProfile,
    PlayerStats, RpcClient, RpcOptions, TransportError, WsConnector, DEFAULT_HEARTBEAT_INTERVAL,
};
use crate::settings::SettingsStore;

/// Wheel zoom per pixel of scroll while ctrl is held.
const PIXEL_SCROLL_ZOOM: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub heartbeat_interval: Duration,
    pub log_limit: usize,
    pub minimap_size: u32,
    /// Upper bound on how long the loop waits before polling the socket.
    pub poll_interval: Duration,
    pub max_render_fps: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            window_title: "Rogue".to_string(),
            window_width: 960,
            window_height: 640,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            log_limit: DEFAULT_LOG_LIMIT,
            minimap_size: DEFAULT_MINIMAP_SIZE,
            poll_interval: Duration::from_millis(4),
            max_render_fps: Some(60),
        }
    }
}

/// Everything bootstrap produced for one play session.
pub struct ClientSession {
    pub graphics: TileGraphics,
    pub socket_url: String,
    pub profile: PlayerProfile,
    pub settings: SettingsStore,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: ClientConfig, session: ClientSession) -> Result<(), AppError> {
    run_app_with_connector(config, session, Box::new(WsConnector))
}

pub fn run_app_with_connector(
    config: ClientConfig,
    session: ClientSession,
    connector: Box<dyn Connector>,
) -> Result<(), AppError> {
    let ClientSession {
        graphics,
        socket_url,
        profile,
        mut settings,
    } = session;

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(window_title(
                &config.window_title,
                ConnectionState::Connecting,
                None,
            ))
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), graphics, config.minimap_size)
        .map_err(AppError::CreateRenderer)?;

    let queue = Rc::new(RefCell::new(RenderQueue::new()));
    let latest_stats: Rc<Cell<Option<PlayerStats>>> = Rc::new(Cell::new(None));
    let link_state = Rc::new(Cell::new(ConnectionState::Connecting));

    let mut client = RpcClient::new(
        socket_url.clone(),
        connector,
        RpcOptions {
            heartbeat_interval: config.heartbeat_interval,
            log_limit: config.log_limit,
        },
    );
    subscribe_render_events(&mut client, &queue, &latest_stats);
    info!(
        socket_url = %socket_url,
        player = %profile.name,
        play_music = settings.settings().play_music,
        "connecting"
    );
    client.connect(
        profile,
        Box::new(TitleListener {
            state: Rc::clone(&link_state),
        }),
    );

    let poll_interval = normalize_poll_interval(config.poll_interval);
    let render_frame_target = target_frame_duration(normalize_render_fps_cap(config.max_render_fps));
    let mut input = InputCollector::default();
    let mut waypoints = WaypointMapper::new();
    let mut hud = HudState::default();
    let mut hud_dirty = true;
    let mut shown_state = ConnectionState::Connecting;
    let mut seen_log_revision = 0;
    let mut last_present = Instant::now();

    event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + poll_interval));
    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(size) => {
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    hud_dirty = true;
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    hud_dirty = true;
                }
                WindowEvent::ModifiersChanged(modifiers) => {
                    input.set_ctrl_down(modifiers.state().control_key());
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => input.clear_cursor_position(),
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    let pointer = match state {
                        ElementState::Pressed => input.cursor_position_px().map(PointerPhase::Down),
                        ElementState::Released => Some(PointerPhase::Up),
                    };
                    if let Some(phase) = pointer {
                        apply_pointer(phase, &mut waypoints, &mut client, &renderer, hud.zoom);
                        hud_dirty = true;
                    }
                }
                WindowEvent::Touch(touch) => {
                    let phase = match touch.phase {
                        TouchPhase::Started => {
                            PointerPhase::Down((touch.location.x as f32, touch.location.y as f32))
                        }
                        TouchPhase::Ended | TouchPhase::Cancelled => PointerPhase::Up,
                        TouchPhase::Moved => return,
                    };
                    apply_pointer(phase, &mut waypoints, &mut client, &renderer, hud.zoom);
                    hud_dirty = true;
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    if let Some(delta) = input.wheel_zoom_delta(delta) {
                        hud.zoom = hud.zoom.adjusted(delta);
                        hud_dirty = true;
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.repeat {
                        return;
                    }
                    let commands = input.handle_key(event.physical_key, event.state);
                    if input.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                        return;
                    }
                    for command in commands {
                        match command {
                            InputCommand::Send(action) => client.send_action(&action),
                            InputCommand::Zoom(delta) => {
                                hud.zoom = hud.zoom.adjusted(delta);
                                hud_dirty = true;
                            }
                            InputCommand::ToggleMusic => toggle_music(&mut settings),
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    let (job, coalesced) = {
                        let mut queue = queue.borrow_mut();
                        (queue.take(), queue.coalesced())
                    };
                    if let Some(job) = job {
                        debug!(coalesced_frames = coalesced, "render_job_applied");
                        renderer.apply(job, client.map_store());
                    }
                    hud.cursor = waypoints.cursor();
                    hud.stats = latest_stats.get();
                    if let Err(error) = renderer.render(client.map_store(), &hud) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present = Instant::now();
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                client.poll(now);

                let state = link_state.get();
                let log = client.activity_log();
                if state != shown_state || log.revision() != seen_log_revision {
                    let notice = log.latest().map(|entry| entry.text.as_str());
                    window.set_title(&window_title(&config.window_title, state, notice));
                    shown_state = state;
                    seen_log_revision = log.revision();
                }
                if latest_stats.get() != hud.stats {
                    hud_dirty = true;
                }

                let mut wake_at = now + poll_interval;
                if hud_dirty || queue.borrow().is_dirty() {
                    let wait = frame_budget_remaining(
                        now.saturating_duration_since(last_present),
                        render_frame_target,
                    );
                    if wait.is_zero() {
                        window.request_redraw();
                        hud_dirty = false;
                    } else {
                        wake_at = wake_at.min(now + wait);
                    }
                }
                window_target.set_control_flow(ControlFlow::WaitUntil(wake_at));
            }
            Event::LoopExiting => {
                client.disconnect();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Feeds network events into the render queue. Frames are queued for the
/// next redraw; room entry invalidates what is queued for the old room.
fn subscribe_render_events(
    client: &mut RpcClient,
    queue: &Rc<RefCell<RenderQueue>>,
    latest_stats: &Rc<Cell<Option<PlayerStats>>>,
) {
    let frames = Rc::clone(queue);
    client.subscribe(EventKind::Frame, move |event| {
        if let NetEvent::Frame(frame) = event {
            frames.borrow_mut().submit_frame(Rc::clone(frame));
        }
    });

    let notices = Rc::clone(queue);
    client.subscribe(EventKind::Notice, move |event| {
        if let NetEvent::Notice(notice) = event {
            if let Some(room) = &notice.entered {
                info!(room = %room, "room_entered");
                notices.borrow_mut().room_entered(room.clone());
            }
        }
    });

    let stats = Rc::clone(latest_stats);
    client.subscribe(EventKind::Stats, move |event| {
        if let NetEvent::Stats(update) = event {
            stats.set(Some(*update));
        }
    });
}

struct TitleListener {
    state: Rc<Cell<ConnectionState>>,
}

impl ConnectionListener for TitleListener {
    fn on_connected(&mut self) {
        self.state.set(ConnectionState::Connected);
    }

    fn on_disconnected(&mut self) {
        self.state.set(ConnectionState::Disconnected);
    }

    fn on_error(&mut self, error: &TransportError) {
        warn!(error = %error, "connection_error");
        self.state.set(ConnectionState::Error);
    }
}

/// Connection status while not connected, otherwise the newest notice.
fn window_title(base: &str, state: ConnectionState, notice: Option<&str>) -> String {
    let status = match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Error => "connection error",
        ConnectionState::Connected => {
            return match notice {
                Some(text) => format!("{base} - {text}"),
                None => base.to_string(),
            };
        }
    };
    format!("{base} ({status})")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointerPhase {
    Down((f32, f32)),
    Up,
}

fn apply_pointer(
    phase: PointerPhase,
    waypoints: &mut WaypointMapper,
    client: &mut RpcClient,
    renderer: &Renderer,
    zoom: Zoom,
) {
    match phase {
        PointerPhase::Down(pixel) => {
            if let Some(action) =
                waypoints.press(pixel, renderer.viewport(), renderer.tile_size(), zoom)
            {
                client.send_action(&action);
            }
        }
        PointerPhase::Up => waypoints.release(),
    }
}

fn toggle_music(settings: &mut SettingsStore) {
    match settings.update(|current| current.play_music = !current.play_music) {
        Ok(updated) => info!(play_music = updated.play_music, "music_toggled"),
        Err(error) => warn!(error = %error, "settings_save_failed"),
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    ctrl_is_down: bool,
    chord: KeyChord,
    cursor_position_px: Option<(f32, f32)>,
}

impl InputCollector {
    fn handle_key(&mut self, key: PhysicalKey, state: ElementState) -> Vec<InputCommand> {
        let Some(action) = action_for_key(key) else {
            return Vec::new();
        };
        match state {
            ElementState::Pressed => {
                if action == InputAction::Quit {
                    self.quit_requested = true;
                }
                self.chord.press(action);
                Vec::new()
            }
            ElementState::Released => self.chord.release(action),
        }
    }

    fn set_ctrl_down(&mut self, is_down: bool) {
        self.ctrl_is_down = is_down;
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some((x, y));
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn cursor_position_px(&self) -> Option<(f32, f32)> {
        self.cursor_position_px
    }

    /// Scroll only zooms while ctrl is held.
    fn wheel_zoom_delta(&self, delta: MouseScrollDelta) -> Option<f32> {
        if !self.ctrl_is_down {
            return None;
        }
        let zoom = zoom_from_scroll_delta(delta);
        (zoom != 0.0).then_some(zoom)
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
        KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
        KeyCode::KeyP => InputAction::Pickup,
        KeyCode::Period => InputAction::Enter,
        KeyCode::KeyF => InputAction::Melee,
        KeyCode::Equal | KeyCode::NumpadAdd => InputAction::ZoomIn,
        KeyCode::Minus | KeyCode::NumpadSubtract => InputAction::ZoomOut,
        KeyCode::KeyM => InputAction::ToggleMusic,
        KeyCode::Escape => InputAction::Quit,
        _ => return None,
    };
    Some(action)
}

fn zoom_from_scroll_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y * ZOOM_STEP,
        MouseScrollDelta::PixelDelta(position) => position.y as f32 * PIXEL_SCROLL_ZOOM,
    }
}

fn normalize_poll_interval(value: Duration) -> Duration {
    if value.is_zero() {
        Duration::from_millis(1)
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

/// Time left before the next present is allowed under the fps cap.
fn frame_budget_remaining(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Action;

    #[test]
    fn wasd_and_arrow_keys_map_to_moves() {
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::KeyW)),
            Some(InputAction::MoveUp)
        );
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::ArrowLeft)),
            Some(InputAction::MoveLeft)
        );
        assert_eq!(action_for_key(PhysicalKey::Code(KeyCode::KeyQ)), None);
    }

    #[test]
    fn key_release_sends_accumulated_move() {
        let mut input = InputCollector::default();
        let down = ElementState::Pressed;
        let up = ElementState::Released;

        assert!(input.handle_key(PhysicalKey::Code(KeyCode::KeyS), down).is_empty());
        assert!(input.handle_key(PhysicalKey::Code(KeyCode::KeyA), down).is_empty());
        let commands = input.handle_key(PhysicalKey::Code(KeyCode::KeyA), up);

        assert_eq!(
            commands,
            vec![InputCommand::Send(Action::Move {
                direction: [-1, 1]
            })]
        );
    }

    #[test]
    fn period_and_f_send_their_actions() {
        let mut input = InputCollector::default();
        input.handle_key(PhysicalKey::Code(KeyCode::Period), ElementState::Pressed);
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::Period), ElementState::Released),
            vec![InputCommand::Send(Action::Enter)]
        );
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::KeyF), ElementState::Released),
            vec![InputCommand::Send(Action::Melee)]
        );
    }

    #[test]
    fn escape_press_requests_quit() {
        let mut input = InputCollector::default();
        input.handle_key(PhysicalKey::Code(KeyCode::Escape), ElementState::Pressed);
        assert!(input.quit_requested);
    }

    #[test]
    fn wheel_zooms_only_with_ctrl() {
        let mut input = InputCollector::default();
        let notch = MouseScrollDelta::LineDelta(0.0, 1.0);
        assert_eq!(input.wheel_zoom_delta(notch), None);

        input.set_ctrl_down(true);
        let delta = input.wheel_zoom_delta(notch).expect("zoom delta");
        assert!((delta - ZOOM_STEP).abs() < 1e-6);
    }

    #[test]
    fn pixel_wheel_delta_scales_by_pixels() {
        let zoom = zoom_from_scroll_delta(MouseScrollDelta::PixelDelta(
            winit::dpi::PhysicalPosition::new(0.0, -30.0),
        ));
        assert!((zoom + 0.3).abs() < 1e-6);
    }

    #[test]
    fn cursor_position_is_tracked_until_left() {
        let mut input = InputCollector::default();
        input.set_cursor_position_px(100.0, 200.0);
        assert_eq!(input.cursor_position_px(), Some((100.0, 200.0)));
        input.clear_cursor_position();
        assert_eq!(input.cursor_position_px(), None);
    }

    #[test]
    fn title_reflects_connection_state_and_latest_notice() {
        assert_eq!(window_title("Rogue", ConnectionState::Connected, None), "Rogue");
        assert_eq!(
            window_title("Rogue", ConnectionState::Connected, Some("You hear a door.")),
            "Rogue - You hear a door."
        );
        assert_eq!(
            window_title("Rogue", ConnectionState::Error, Some("stale")),
            "Rogue (connection error)"
        );
    }

    #[test]
    fn listener_records_lifecycle() {
        let state = Rc::new(Cell::new(ConnectionState::Connecting));
        let mut listener = TitleListener {
            state: Rc::clone(&state),
        };
        listener.on_connected();
        assert_eq!(state.get(), ConnectionState::Connected);
        listener.on_error(&TransportError::NotOpen);
        assert_eq!(state.get(), ConnectionState::Error);
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(normalize_render_fps_cap(Some(0))), None);
    }

    #[test]
    fn frame_budget_zero_when_over_target() {
        let target = target_frame_duration(Some(60));
        assert_eq!(
            frame_budget_remaining(Duration::from_millis(20), target),
            Duration::ZERO
        );
        assert!(frame_budget_remaining(Duration::from_millis(5), target) > Duration::ZERO);
    }

    #[test]
    fn zero_poll_interval_is_normalized() {
        assert_eq!(
            normalize_poll_interval(Duration::ZERO),
            Duration::from_millis(1)
        );
    }
}
