use thiserror::Error;

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

/// Tilemap origin convention:
/// - `origin` is the world position of tile (0,0) bottom-left corner.
/// - The center of tile (x,y) is `origin + (x + 0.5, y + 0.5)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    origin: Vec2,
    tiles: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tile ({x},{y}) is outside a {width}x{height} map")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        origin: Vec2,
        tiles: Vec<u16>,
    ) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            origin,
            tiles,
        })
    }

    pub fn filled(width: u32, height: u32, origin: Vec2, tile_id: u16) -> Self {
        Self {
            width,
            height,
            origin,
            tiles: vec![tile_id; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u16> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn set_tile(&mut self, x: u32, y: u32, tile_id: u16) -> Result<(), TilemapError> {
        let index = self.index_of(x, y).ok_or(TilemapError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.tiles[index] = tile_id;
        Ok(())
    }

    pub fn tile_center_world(&self, x: u32, y: u32) -> Option<Vec2> {
        self.index_of(x, y)?;
        Some(Vec2 {
            x: self.origin.x + x as f32 + 0.5,
            y: self.origin.y + y as f32 + 0.5,
        })
    }

    pub fn world_to_tile(&self, world: Vec2) -> Option<TileCoord> {
        let tile_x = (world.x - self.origin.x).floor();
        let tile_y = (world.y - self.origin.y).floor();
        if !tile_x.is_finite() || !tile_y.is_finite() || tile_x < 0.0 || tile_y < 0.0 {
            return None;
        }
        let tile_x = tile_x as u32;
        let tile_y = tile_y as u32;
        self.index_of(tile_x, tile_y)?;
        Some(TileCoord {
            x: tile_x,
            y: tile_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilemap_new_rejects_invalid_tile_count() {
        let err = Tilemap::new(2, 2, Vec2::ZERO, vec![0, 1, 2]).expect_err("err");
        assert_eq!(
            err,
            TilemapError::TileCountMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn tilemap_indexing_and_bounds() {
        let tilemap = Tilemap::new(2, 2, Vec2::ZERO, vec![10, 11, 12, 13]).expect("tilemap");
        assert_eq!(tilemap.tile_at(0, 0), Some(10));
        assert_eq!(tilemap.tile_at(1, 1), Some(13));
        assert_eq!(tilemap.tile_at(2, 0), None);
    }

    #[test]
    fn world_to_tile_respects_origin() {
        let tilemap = Tilemap::filled(4, 4, Vec2::new(-2.0, -2.0), 0);
        assert_eq!(
            tilemap.world_to_tile(Vec2::new(-1.5, 0.5)),
            Some(TileCoord { x: 0, y: 2 })
        );
        assert_eq!(tilemap.world_to_tile(Vec2::new(-2.5, 0.0)), None);
        assert_eq!(tilemap.world_to_tile(Vec2::new(2.0, 0.0)), None);
    }

    #[test]
    fn set_tile_out_of_bounds_errors() {
        let mut tilemap = Tilemap::filled(2, 2, Vec2::ZERO, 0);
        assert!(tilemap.set_tile(1, 1, 2).is_ok());
        assert_eq!(tilemap.tile_at(1, 1), Some(2));
        assert!(matches!(
            tilemap.set_tile(5, 0, 2),
            Err(TilemapError::OutOfBounds { .. })
        ));
    }
}
