use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::map_store::TileIndex;

/// Server-assigned room identifier. Rooms are keyed by text even when the
/// server sends a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoomIdVisitor;

        impl<'de> Visitor<'de> for RoomIdVisitor {
            type Value = RoomId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a room id string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RoomId, E> {
                Ok(RoomId::new(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RoomId, E> {
                Ok(RoomId::new(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RoomId, E> {
                Ok(RoomId::new(value.to_string()))
            }
        }

        deserializer.deserialize_any(RoomIdVisitor)
    }
}

/// One cell of a viewport frame: `[in_fov, terrain, objects...]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    pub in_fov: bool,
    pub terrain: i32,
    pub objects: Vec<i32>,
}

impl Cell {
    /// Terrain indices above zero are known tiles; zero and below are not.
    pub fn known_terrain(&self) -> Option<TileIndex> {
        u32::try_from(self.terrain).ok().filter(|index| *index > 0)
    }

    /// Object layers in draw order; negative entries mean "nothing here".
    pub fn object_tiles(&self) -> impl Iterator<Item = TileIndex> + '_ {
        self.objects
            .iter()
            .filter_map(|index| u32::try_from(*index).ok())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = Cell;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a cell array [in_fov, terrain, objects...]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Cell, A::Error> {
                let in_fov = seq
                    .next_element::<FovFlag>()?
                    .map(|flag| flag.0)
                    .unwrap_or(false);
                let terrain = seq
                    .next_element::<Option<i64>>()?
                    .flatten()
                    .map(saturate_i32)
                    .unwrap_or(-1);
                let mut objects = Vec::new();
                while let Some(object) = seq.next_element::<Option<i64>>()? {
                    objects.push(object.map(saturate_i32).unwrap_or(-1));
                }
                Ok(Cell {
                    in_fov,
                    terrain,
                    objects,
                })
            }
        }

        deserializer.deserialize_seq(CellVisitor)
    }
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// The visibility flag arrives as a bool, an integer or nil depending on the
/// server build; anything truthy counts as in view.
struct FovFlag(bool);

impl<'de> Deserialize<'de> for FovFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FovVisitor;

        impl<'de> Visitor<'de> for FovVisitor {
            type Value = FovFlag;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a visibility flag")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<FovFlag, E> {
                Ok(FovFlag(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<FovFlag, E> {
                Ok(FovFlag(value != 0))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<FovFlag, E> {
                Ok(FovFlag(value != 0))
            }

            fn visit_unit<E: de::Error>(self) -> Result<FovFlag, E> {
                Ok(FovFlag(false))
            }

            fn visit_none<E: de::Error>(self) -> Result<FovFlag, E> {
                Ok(FovFlag(false))
            }
        }

        deserializer.deserialize_any(FovVisitor)
    }
}

/// A server-pushed snapshot of the area around the player.
///
/// `x`/`y` is the player's room position and the window is centred on it:
/// window column `wx` maps to room column `x - cols / 2 + wx`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewportFrame {
    #[serde(rename = "id")]
    pub room: RoomId,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "frame")]
    pub cells: Vec<Vec<Cell>>,
}

impl ViewportFrame {
    /// Window size in cells, taken from the first row and the row count.
    pub fn window_size(&self) -> (i32, i32) {
        let cols = self.cells.first().map_or(0, Vec::len);
        (
            i32::try_from(cols).unwrap_or(i32::MAX),
            i32::try_from(self.cells.len()).unwrap_or(i32::MAX),
        )
    }

    /// Room coordinate of window cell (0, 0).
    pub fn window_origin(&self) -> (i32, i32) {
        let (cols, rows) = self.window_size();
        (
            self.x.saturating_sub(cols / 2),
            self.y.saturating_sub(rows / 2),
        )
    }

    pub fn cell(&self, wx: i32, wy: i32) -> Option<&Cell> {
        let row = self.cells.get(usize::try_from(wy).ok()?)?;
        row.get(usize::try_from(wx).ok()?)
    }

    /// Cell covering room position `(rx, ry)`, if the window reaches it.
    pub fn cell_at_room(&self, rx: i32, ry: i32) -> Option<&Cell> {
        let (origin_x, origin_y) = self.window_origin();
        self.cell(rx.saturating_sub(origin_x), ry.saturating_sub(origin_y))
    }

    /// Whether room position `(rx, ry)` falls inside the declared window box.
    pub fn window_contains(&self, rx: i32, ry: i32) -> bool {
        let (cols, rows) = self.window_size();
        let (origin_x, origin_y) = self.window_origin();
        rx >= origin_x
            && rx < origin_x.saturating_add(cols)
            && ry >= origin_y
            && ry < origin_y.saturating_add(rows)
    }

    /// Rejects frames whose room or window is larger than the client will
    /// allocate, or whose player position lies outside the room.
    pub fn check_bounds(&self) -> Result<(), FrameBoundsError> {
        let cells = u64::from(self.width) * u64::from(self.height);
        if cells == 0 || cells > MAX_ROOM_CELLS {
            return Err(FrameBoundsError::RoomSize {
                width: self.width,
                height: self.height,
            });
        }
        let (cols, rows) = self.window_size();
        if cols > MAX_WINDOW_SIDE || rows > MAX_WINDOW_SIDE {
            return Err(FrameBoundsError::WindowSize { cols, rows });
        }
        let inside_x = u32::try_from(self.x).is_ok_and(|x| x < self.width);
        let inside_y = u32::try_from(self.y).is_ok_and(|y| y < self.height);
        if !inside_x || !inside_y {
            return Err(FrameBoundsError::Position {
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }
}

/// Largest room the map store will allocate, in cells.
pub const MAX_ROOM_CELLS: u64 = 1 << 22;
/// Largest window edge accepted from a frame.
pub const MAX_WINDOW_SIDE: i32 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameBoundsError {
    #[error("room size {width}x{height} is empty or too large")]
    RoomSize { width: u32, height: u32 },
    #[error("frame window {cols}x{rows} is too large")]
    WindowSize { cols: i32, rows: i32 },
    #[error("player position ({x}, {y}) lies outside the room")]
    Position { x: i32, y: i32 },
}

/// Player-facing notice; `entered` is set when the player changes room.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub notice: Option<String>,
    #[serde(default)]
    pub entered: Option<RoomId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PlayerStats {
    pub hp: i32,
    #[serde(rename = "tot")]
    pub max_hp: i32,
}

impl PlayerStats {
    /// Remaining health as a fraction in `[0, 1]`.
    pub fn health_fraction(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        (self.hp as f32 / self.max_hp as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsMessage {
    pub stats: PlayerStats,
}
