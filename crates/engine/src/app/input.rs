use super::rendering::{scaled_tile_px, visible_window, Viewport, Zoom, ZOOM_STEP};
use crate::net::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Pickup,
    Enter,
    Melee,
    ZoomIn,
    ZoomOut,
    ToggleMusic,
    Quit,
}

const ACTION_COUNT: usize = 11;

const ALL_ACTIONS: [InputAction; ACTION_COUNT] = [
    InputAction::MoveUp,
    InputAction::MoveDown,
    InputAction::MoveLeft,
    InputAction::MoveRight,
    InputAction::Pickup,
    InputAction::Enter,
    InputAction::Melee,
    InputAction::ZoomIn,
    InputAction::ZoomOut,
    InputAction::ToggleMusic,
    InputAction::Quit,
];

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    fn clear(&mut self) {
        self.down = [false; ACTION_COUNT];
    }

    fn iter_down(&self) -> impl Iterator<Item = InputAction> + '_ {
        ALL_ACTIONS
            .into_iter()
            .filter(move |action| self.is_down(*action))
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Pickup => 4,
            InputAction::Enter => 5,
            InputAction::Melee => 6,
            InputAction::ZoomIn => 7,
            InputAction::ZoomOut => 8,
            InputAction::ToggleMusic => 9,
            InputAction::Quit => 10,
        }
    }

    /// Step contributed to a move chord, `(0, 0)` for non-movement keys.
    pub const fn direction(self) -> (i32, i32) {
        match self {
            InputAction::MoveUp => (0, -1),
            InputAction::MoveDown => (0, 1),
            InputAction::MoveLeft => (-1, 0),
            InputAction::MoveRight => (1, 0),
            _ => (0, 0),
        }
    }
}

/// Something the runner should do in response to input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Send(Action),
    Zoom(f32),
    ToggleMusic,
}

/// Collects keys pressed since the last release. Releasing any key resolves
/// the whole chord, so `w` + `d` released together moves diagonally.
#[derive(Debug, Clone, Default)]
pub struct KeyChord {
    pressed: ActionStates,
}

impl KeyChord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, action: InputAction) {
        self.pressed.set(action, true);
    }

    /// Resolves every key in the chord, including the released one, then
    /// starts a new chord. A move is only emitted for a non-zero direction.
    pub fn release(&mut self, action: InputAction) -> Vec<InputCommand> {
        self.pressed.set(action, true);

        let mut commands = Vec::new();
        let (mut dx, mut dy) = (0, 0);
        for action in self.pressed.iter_down() {
            let (step_x, step_y) = action.direction();
            dx += step_x;
            dy += step_y;
            match action {
                InputAction::Pickup => commands.push(InputCommand::Send(Action::Pickup)),
                InputAction::Enter => commands.push(InputCommand::Send(Action::Enter)),
                InputAction::Melee => commands.push(InputCommand::Send(Action::Melee)),
                InputAction::ZoomIn => commands.push(InputCommand::Zoom(ZOOM_STEP)),
                InputAction::ZoomOut => commands.push(InputCommand::Zoom(-ZOOM_STEP)),
                InputAction::ToggleMusic => commands.push(InputCommand::ToggleMusic),
                _ => {}
            }
        }
        if dx != 0 || dy != 0 {
            commands.push(InputCommand::Send(Action::Move {
                direction: [dx, dy],
            }));
        }

        self.pressed.clear();
        commands
    }
}

/// Tile offset from the player for a click at `pixel`, in the server's
/// waypoint convention. The trailing `- 1` matches what the server expects.
pub fn waypoint_offset(
    pixel: (f32, f32),
    viewport: Viewport,
    base_tile_size: u32,
    zoom: Zoom,
) -> Option<[i32; 2]> {
    let (cols, rows) = visible_window(viewport, base_tile_size, zoom)?;
    let tile_px = scaled_tile_px(base_tile_size, zoom);
    let axis = |px: f32, window: i32| (px / tile_px + 0.5).floor() as i32 - window / 2 - 1;
    Some([axis(pixel.0, cols), axis(pixel.1, rows)])
}

/// Turns pointer presses into waypoint actions and remembers where the
/// pointer went down so the cursor can be drawn until release.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaypointMapper {
    cursor: Option<(f32, f32)>,
}

impl WaypointMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<(f32, f32)> {
        self.cursor
    }

    pub fn press(
        &mut self,
        pixel: (f32, f32),
        viewport: Viewport,
        base_tile_size: u32,
        zoom: Zoom,
    ) -> Option<Action> {
        let pos = waypoint_offset(pixel, viewport, base_tile_size, zoom)?;
        self.cursor = Some(pixel);
        Some(Action::Waypoint { pos })
    }

    pub fn release(&mut self) {
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 640,
        height: 480,
    };

    #[test]
    fn releasing_one_key_resolves_the_whole_chord() {
        let mut chord = KeyChord::new();
        chord.press(InputAction::MoveUp);
        chord.press(InputAction::MoveRight);

        let commands = chord.release(InputAction::MoveRight);
        assert_eq!(
            commands,
            vec![InputCommand::Send(Action::Move {
                direction: [1, -1]
            })]
        );
    }

    #[test]
    fn released_key_counts_even_after_previous_chord() {
        let mut chord = KeyChord::new();
        chord.press(InputAction::MoveLeft);
        chord.press(InputAction::MoveDown);
        chord.release(InputAction::MoveLeft);

        let commands = chord.release(InputAction::MoveDown);
        assert_eq!(
            commands,
            vec![InputCommand::Send(Action::Move {
                direction: [0, 1]
            })]
        );
    }

    #[test]
    fn opposite_moves_cancel_and_send_nothing() {
        let mut chord = KeyChord::new();
        chord.press(InputAction::MoveLeft);
        chord.press(InputAction::MoveRight);
        assert!(chord.release(InputAction::MoveRight).is_empty());
    }

    #[test]
    fn non_move_keys_emit_their_commands_before_the_move() {
        let mut chord = KeyChord::new();
        chord.press(InputAction::MoveDown);
        chord.press(InputAction::Pickup);
        chord.press(InputAction::ZoomOut);

        let commands = chord.release(InputAction::Pickup);
        assert_eq!(
            commands,
            vec![
                InputCommand::Send(Action::Pickup),
                InputCommand::Zoom(-ZOOM_STEP),
                InputCommand::Send(Action::Move {
                    direction: [0, 1]
                }),
            ]
        );
    }

    #[test]
    fn quit_is_not_part_of_chord_output() {
        let mut chord = KeyChord::new();
        assert!(chord.release(InputAction::Quit).is_empty());
    }

    #[test]
    fn centre_click_lands_one_tile_up_left() {
        // 32px tiles at 0.5 -> 16px, window 40x30.
        let offset = waypoint_offset((320.0, 240.0), VIEWPORT, 32, Zoom::new(0.5));
        assert_eq!(offset, Some([-1, -1]));
    }

    #[test]
    fn waypoint_rounds_to_nearest_tile_edge() {
        let zoom = Zoom::new(0.5);
        assert_eq!(
            waypoint_offset((8.0, 8.0), VIEWPORT, 32, zoom),
            Some([-20, -15])
        );
        assert_eq!(
            waypoint_offset((7.9, 0.0), VIEWPORT, 32, zoom),
            Some([-21, -16])
        );
    }

    #[test]
    fn zero_tile_size_has_no_waypoint() {
        assert_eq!(
            waypoint_offset((10.0, 10.0), VIEWPORT, 0, Zoom::default()),
            None
        );
    }

    #[test]
    fn mapper_keeps_cursor_until_release() {
        let mut mapper = WaypointMapper::new();
        let action = mapper.press((320.0, 240.0), VIEWPORT, 32, Zoom::new(0.5));
        assert_eq!(action, Some(Action::Waypoint { pos: [-1, -1] }));
        assert_eq!(mapper.cursor(), Some((320.0, 240.0)));

        mapper.release();
        assert_eq!(mapper.cursor(), None);
    }
}
