use serde::Deserialize;
use tracing::warn;

use crate::map_store::TileIndex;

pub const FALLBACK_TILE_COLOR: [u8; 4] = [128, 128, 128, 255];

/// Server manifest describing the tileset and where to connect.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub tileset: TileSetSpec,
    pub tiles_url: String,
    pub socket_url: String,
    #[serde(default)]
    pub music: Vec<String>,
    #[serde(default)]
    pub server_age: Option<f64>,
    #[serde(default)]
    pub num_players_online: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileSetSpec {
    pub tilesize: u32,
    pub tilemap: Vec<TileSpec>,
}

/// `[[atlas_x, atlas_y], color]` on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct TileSpec(pub [u32; 2], pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRecord {
    /// Atlas cell, in tile units.
    pub atlas: (u32, u32),
    /// Representative color used by the minimap.
    pub color: [u8; 4],
}

/// Immutable tile lookup table built from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSet {
    tile_size: u32,
    records: Vec<TileRecord>,
}

impl TileSet {
    pub fn new(tile_size: u32, records: Vec<TileRecord>) -> Self {
        Self { tile_size, records }
    }

    pub fn from_spec(spec: &TileSetSpec) -> Self {
        let records = spec
            .tilemap
            .iter()
            .enumerate()
            .map(|(index, TileSpec(atlas, color))| {
                let color = parse_css_color(color).unwrap_or_else(|| {
                    warn!(index, color = %color, "tile_color_unparsed_using_fallback");
                    FALLBACK_TILE_COLOR
                });
                TileRecord {
                    atlas: (atlas[0], atlas[1]),
                    color,
                }
            })
            .collect();
        Self::new(spec.tilesize, records)
    }

    /// Edge length of one atlas tile in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn get(&self, index: TileIndex) -> Option<&TileRecord> {
        self.records.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses the CSS color forms the server emits.
pub fn parse_css_color(raw: &str) -> Option<[u8; 4]> {
    let text = raw.trim().to_ascii_lowercase();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = text
        .strip_prefix("rgba(")
        .or_else(|| text.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }
    named_color(&text)
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    let nibble = |index: usize| -> Option<u8> {
        let digit = u8::from_str_radix(hex.get(index..index + 1)?, 16).ok()?;
        Some(digit * 17)
    };
    let byte =
        |index: usize| -> Option<u8> { u8::from_str_radix(hex.get(index..index + 2)?, 16).ok() };

    match hex.len() {
        3 => Some([nibble(0)?, nibble(1)?, nibble(2)?, 255]),
        4 => Some([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |part: &str| -> Option<u8> {
        let value: f32 = part.parse().ok()?;
        Some(value.clamp(0.0, 255.0).round() as u8)
    };
    match parts.as_slice() {
        &[r, g, b] => Some([channel(r)?, channel(g)?, channel(b)?, 255]),
        &[r, g, b, a] => {
            let alpha: f32 = a.parse().ok()?;
            Some([
                channel(r)?,
                channel(g)?,
                channel(b)?,
                (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ])
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<[u8; 4]> {
    let rgb = match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "brown" => [165, 42, 42],
        "gray" | "grey" => [128, 128, 128],
        "transparent" => return Some([0, 0, 0, 0]),
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 255])
}
