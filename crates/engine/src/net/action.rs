use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

/// Player commands. Each serializes as a map tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Inventory,
    Equip { item: ItemId },
    Use { item: ItemId },
    Move { direction: [i32; 2] },
    Enter,
    Melee,
    Pickup,
    Waypoint { pos: [i32; 2] },
    PlayerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Handshake<'a> {
    pub profile: &'a PlayerProfile,
}

#[derive(Debug, Serialize)]
pub(crate) struct Ping {
    pub ping: u64,
}
