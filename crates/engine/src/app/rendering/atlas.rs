use std::io;
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;

use super::canvas::{Canvas, PixelRect, Rgba};
use crate::map_store::TileIndex;
use crate::tileset::TileSet;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("failed to open tile atlas {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode tile atlas {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("atlas buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("tileset declares a zero tile size")]
    ZeroTileSize,
}

/// Decoded tile sheet in RGBA8.
#[derive(Debug, Clone)]
pub struct TileAtlas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TileAtlas {
    pub fn load(path: &Path) -> Result<Self, AtlasError> {
        let reader = ImageReader::open(path).map_err(|source| AtlasError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| AtlasError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let image = decoded.to_rgba8();
        Self::from_rgba(image.width(), image.height(), image.into_raw())
    }

    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, AtlasError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(AtlasError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// The tileset paired with its atlas image; everything the renderers need to
/// turn a tile index into pixels.
#[derive(Debug, Clone)]
pub struct TileGraphics {
    tileset: TileSet,
    atlas: TileAtlas,
}

impl TileGraphics {
    pub fn new(tileset: TileSet, atlas: TileAtlas) -> Result<Self, AtlasError> {
        if tileset.tile_size() == 0 {
            return Err(AtlasError::ZeroTileSize);
        }
        Ok(Self { tileset, atlas })
    }

    pub fn tile_size(&self) -> u32 {
        self.tileset.tile_size()
    }

    /// Draws tile `index` scaled into `dst`. Returns false when the index has
    /// no record or its atlas cell lies outside the image.
    pub fn draw_tile(&self, canvas: &mut Canvas<'_>, index: TileIndex, dst: PixelRect) -> bool {
        let Some(record) = self.tileset.get(index) else {
            return false;
        };
        let size = self.tile_size();
        let (Some(left), Some(top)) = (
            record.atlas.0.checked_mul(size),
            record.atlas.1.checked_mul(size),
        ) else {
            return false;
        };
        if left.saturating_add(size) > self.atlas.width
            || top.saturating_add(size) > self.atlas.height
        {
            return false;
        }

        let src = PixelRect::new(left as i32, top as i32, size as i32, size as i32);
        canvas.blit_scaled(&self.atlas.rgba, self.atlas.width, src, dst);
        true
    }

    pub fn minimap_color(&self, index: TileIndex) -> Option<Rgba> {
        self.tileset.get(index).map(|record| record.color)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::tileset::TileRecord;

    /// 2x1-tile atlas of 2px tiles: tile 0 is blue, tile 1 is green. Records
    /// 0..3 map to atlas cells (0,0), (1,0), (5,5) so index 2 is out of range.
    pub(crate) fn sample_graphics() -> TileGraphics {
        let mut rgba = Vec::new();
        for _row in 0..2 {
            for column in 0..4 {
                let color: Rgba = if column < 2 {
                    [0, 0, 255, 255]
                } else {
                    [0, 255, 0, 255]
                };
                rgba.extend_from_slice(&color);
            }
        }
        let atlas = TileAtlas::from_rgba(4, 2, rgba).expect("atlas");
        let tileset = TileSet::new(
            2,
            vec![
                TileRecord {
                    atlas: (0, 0),
                    color: [0, 0, 200, 255],
                },
                TileRecord {
                    atlas: (1, 0),
                    color: [0, 200, 0, 255],
                },
                TileRecord {
                    atlas: (5, 5),
                    color: [200, 200, 200, 255],
                },
            ],
        );
        TileGraphics::new(tileset, atlas).expect("graphics")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_graphics;
    use super::*;
    use crate::tileset::TileRecord;

    #[test]
    fn draw_tile_scales_atlas_cell_into_rect() {
        let graphics = sample_graphics();
        let mut buffer = vec![0; 8 * 4 * 4];
        let mut canvas = Canvas::new(&mut buffer, 8, 4);

        assert!(graphics.draw_tile(&mut canvas, 1, PixelRect::new(4, 0, 4, 4)));
        assert_eq!(canvas.pixel(4, 0), Some([0, 255, 0, 255]));
        assert_eq!(canvas.pixel(7, 3), Some([0, 255, 0, 255]));
        assert_eq!(canvas.pixel(3, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn unknown_or_out_of_atlas_tiles_are_not_drawn() {
        let graphics = sample_graphics();
        let mut buffer = vec![0; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut buffer, 4, 4);

        assert!(!graphics.draw_tile(&mut canvas, 2, PixelRect::new(0, 0, 4, 4)));
        assert!(!graphics.draw_tile(&mut canvas, 9, PixelRect::new(0, 0, 4, 4)));
        assert!(buffer.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(matches!(
            TileAtlas::from_rgba(2, 2, vec![0; 15]),
            Err(AtlasError::BufferSize { expected: 16, .. })
        ));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let atlas = TileAtlas::from_rgba(1, 1, vec![0; 4]).expect("atlas");
        let tileset = TileSet::new(
            0,
            vec![TileRecord {
                atlas: (0, 0),
                color: [0; 4],
            }],
        );
        assert!(matches!(
            TileGraphics::new(tileset, atlas),
            Err(AtlasError::ZeroTileSize)
        ));
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tiles.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .expect("save png");

        let atlas = TileAtlas::load(&path).expect("load");
        assert_eq!((atlas.width(), atlas.height()), (4, 2));
        assert!(matches!(
            TileAtlas::load(&dir.path().join("missing.png")),
            Err(AtlasError::Open { .. })
        ));
    }
}
