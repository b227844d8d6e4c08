//! Tile addressing.
//!
//! At depth `d` the plane is split into `2^d x 2^d` square tiles of width
//! `side / 2^d`. Indices count from the plane's minimum corner, so every
//! tile that exists has `0 <= ix, iy < 2^d`.

use crate::{Bounds, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Position of a tile in the subdivision. Doubles as the tile's identity in
/// the cache and the job queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub depth: u32,
    pub ix: i64,
    pub iy: i64,
}

impl TileKey {
    pub fn new(depth: u32, ix: i64, iy: i64) -> Self {
        Self { depth, ix, iy }
    }

    /// Spatial section of this tile inside `plane`.
    pub fn section(&self, plane: &Bounds) -> Bounds {
        let w = tile_width(plane.width(), self.depth);
        Bounds::new(
            plane.min_x + self.ix as f64 * w,
            plane.min_y + self.iy as f64 * w,
            plane.min_x + (self.ix + 1) as f64 * w,
            plane.min_y + (self.iy + 1) as f64 * w,
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.depth, self.ix, self.iy)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid tile id '{0}': expected depth:ix:iy")]
pub struct TileKeyParseError(pub String);

impl FromStr for TileKey {
    type Err = TileKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TileKeyParseError(s.to_string());
        let mut parts = s.split(':');

        let depth = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let ix = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let iy = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self { depth, ix, iy })
    }
}

/// A tile ready to be computed: where it is and how many texels it gets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub key: TileKey,
    pub section: Bounds,
    pub resolution: Resolution,
}

/// Index range of the tiles covering a view at one depth.
///
/// `min_*` are inclusive, `max_*` exclusive. Two corner sets compare equal
/// only when the depth and all four bounds match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCorners {
    pub depth: u32,
    pub min_ix: i64,
    pub max_ix: i64,
    pub min_iy: i64,
    pub max_iy: i64,
}

impl TileCorners {
    pub fn is_empty(&self) -> bool {
        self.min_ix >= self.max_ix || self.min_iy >= self.max_iy
    }

    pub fn tile_count(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            ((self.max_ix - self.min_ix) * (self.max_iy - self.min_iy)) as usize
        }
    }

    /// Keys in row-major order.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        (self.min_iy..self.max_iy).flat_map(move |iy| {
            (self.min_ix..self.max_ix).map(move |ix| TileKey::new(self.depth, ix, iy))
        })
    }
}

pub fn tile_width(plane_side: f64, depth: u32) -> f64 {
    plane_side / 2f64.powi(depth as i32)
}

/// Lays out the tiles covering a view and remembers the last view it saw.
#[derive(Clone, Debug)]
pub struct Tiler {
    plane: Bounds,
    resolution: u32,
    previous: Option<TileCorners>,
}

impl Tiler {
    pub fn new(plane: Bounds, resolution: u32) -> Self {
        Self {
            plane,
            resolution,
            previous: None,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Changing the texel resolution invalidates the remembered view.
    pub fn set_resolution(&mut self, resolution: u32) {
        if resolution != self.resolution {
            self.resolution = resolution;
            self.previous = None;
        }
    }

    pub fn tile_width(&self, depth: u32) -> f64 {
        tile_width(self.plane.width(), depth)
    }

    pub fn corners_for_depth(&self, bounds: &Bounds, depth: u32) -> TileCorners {
        let w = self.tile_width(depth);
        let count = 1i64 << depth.min(62);
        let index = |offset: f64, round: fn(f64) -> f64| -> i64 {
            let i = round(offset / w);
            if i.is_nan() {
                0
            } else {
                (i.clamp(0.0, count as f64)) as i64
            }
        };

        TileCorners {
            depth,
            min_ix: index(bounds.min_x - self.plane.min_x, f64::floor),
            max_ix: index(bounds.max_x - self.plane.min_x, f64::ceil),
            min_iy: index(bounds.min_y - self.plane.min_y, f64::floor),
            max_iy: index(bounds.max_y - self.plane.min_y, f64::ceil),
        }
    }

    pub fn lay_tiles(&self, bounds: &Bounds, depth: u32) -> Vec<Tile> {
        let corners = self.corners_for_depth(bounds, depth);
        let resolution = Resolution::square(self.resolution);

        corners
            .keys()
            .map(|key| Tile {
                key,
                section: key.section(&self.plane),
                resolution,
            })
            .collect()
    }

    /// True when the tiles covering `bounds` at `depth` differ from the
    /// previous call. The new corner set is remembered either way.
    pub fn view_changed(&mut self, bounds: &Bounds, depth: u32) -> bool {
        let corners = self.corners_for_depth(bounds, depth);
        let changed = self.previous != Some(corners);
        self.previous = Some(corners);
        changed
    }

    /// Make the next `view_changed` report a change.
    pub fn forget_view(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiler() -> Tiler {
        Tiler::new(Bounds::square((0.0, 0.0), 4.0), 64)
    }

    // ============================================================================
    // TileKey
    // ============================================================================

    #[test]
    fn tile_key_display_and_parse() {
        let key = TileKey::new(3, 5, -1);

        assert_eq!(key.to_string(), "3:5:-1");
        assert_eq!("3:5:-1".parse::<TileKey>(), Ok(key));
    }

    #[test]
    fn tile_key_parse_rejects_garbage() {
        assert!("3:5".parse::<TileKey>().is_err());
        assert!("3:5:1:9".parse::<TileKey>().is_err());
        assert!("a:b:c".parse::<TileKey>().is_err());
        assert!("".parse::<TileKey>().is_err());
    }

    #[test]
    fn doubling_depth_halves_width() {
        let tiler = tiler();
        for depth in 0..20 {
            assert_eq!(tiler.tile_width(depth + 1) * 2.0, tiler.tile_width(depth));
        }
    }

    #[test]
    fn section_is_deterministic() {
        let plane = Bounds::square((0.0, 0.0), 4.0);
        let key = TileKey::new(2, 3, 1);

        assert_eq!(key.section(&plane), Bounds::new(1.0, -1.0, 2.0, 0.0));
        assert_eq!(key.section(&plane), key.section(&plane));
    }

    // ============================================================================
    // Corners
    // ============================================================================

    #[test]
    fn corners_cover_partial_tiles() {
        let corners = tiler().corners_for_depth(&Bounds::new(-1.5, -0.5, 0.25, 0.5), 2);

        assert_eq!(
            corners,
            TileCorners {
                depth: 2,
                min_ix: 0,
                max_ix: 3,
                min_iy: 1,
                max_iy: 3,
            }
        );
        assert_eq!(corners.tile_count(), 6);
    }

    #[test]
    fn corners_are_clamped_to_plane() {
        let corners = tiler().corners_for_depth(&Bounds::new(-10.0, -10.0, 10.0, 10.0), 1);

        assert_eq!((corners.min_ix, corners.max_ix), (0, 2));
        assert_eq!((corners.min_iy, corners.max_iy), (0, 2));
    }

    #[test]
    fn corners_equality_needs_same_depth() {
        let tiler = tiler();
        let bounds = Bounds::new(-2.0, -2.0, 2.0, 2.0);

        assert_eq!(
            tiler.corners_for_depth(&bounds, 1),
            tiler.corners_for_depth(&bounds, 1)
        );
        assert_ne!(
            tiler.corners_for_depth(&bounds, 1),
            tiler.corners_for_depth(&bounds, 2)
        );
    }

    // ============================================================================
    // Laying tiles
    // ============================================================================

    #[test]
    fn four_quadrants_at_depth_one() {
        let tiles = tiler().lay_tiles(&Bounds::new(-2.0, -2.0, 2.0, 2.0), 1);

        let keys: Vec<_> = tiles.iter().map(|t| (t.key.ix, t.key.iy)).collect();
        assert_eq!(keys, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);

        for tile in &tiles {
            assert_eq!(tile.section.width(), 2.0);
            assert_eq!(tile.section.height(), 2.0);
            assert_eq!(tile.resolution, Resolution::square(64));
        }

        assert_eq!(tiles[0].section, Bounds::new(-2.0, -2.0, 0.0, 0.0));
        assert_eq!(tiles[1].section, Bounds::new(0.0, -2.0, 2.0, 0.0));
        assert_eq!(tiles[2].section, Bounds::new(-2.0, 0.0, 0.0, 2.0));
        assert_eq!(tiles[3].section, Bounds::new(0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn laid_tiles_cover_without_gaps_or_overlap() {
        let tiler = tiler();
        let view = Bounds::new(-1.3, -0.7, 1.1, 1.9);
        let depth = 4;
        let tiles = tiler.lay_tiles(&view, depth);
        let corners = tiler.corners_for_depth(&view, depth);

        assert_eq!(tiles.len(), corners.tile_count());

        // Union of the sections is the aligned rectangle and contains the view.
        let min_x = tiles.iter().map(|t| t.section.min_x).fold(f64::MAX, f64::min);
        let max_x = tiles.iter().map(|t| t.section.max_x).fold(f64::MIN, f64::max);
        let min_y = tiles.iter().map(|t| t.section.min_y).fold(f64::MAX, f64::min);
        let max_y = tiles.iter().map(|t| t.section.max_y).fold(f64::MIN, f64::max);
        assert!(min_x <= view.min_x && max_x >= view.max_x);
        assert!(min_y <= view.min_y && max_y >= view.max_y);

        let area: f64 = tiles
            .iter()
            .map(|t| t.section.width() * t.section.height())
            .sum();
        let union_area = (max_x - min_x) * (max_y - min_y);
        assert!((area - union_area).abs() < 1e-12);

        // Neighbours share edges exactly.
        let by_key: std::collections::HashMap<_, _> =
            tiles.iter().map(|t| (t.key, t.section)).collect();
        for tile in &tiles {
            let right = TileKey::new(depth, tile.key.ix + 1, tile.key.iy);
            if let Some(next) = by_key.get(&right) {
                assert_eq!(next.min_x, tile.section.max_x);
            }
            let below = TileKey::new(depth, tile.key.ix, tile.key.iy + 1);
            if let Some(next) = by_key.get(&below) {
                assert_eq!(next.min_y, tile.section.max_y);
            }
        }
    }

    #[test]
    fn view_outside_plane_lays_nothing() {
        let tiles = tiler().lay_tiles(&Bounds::new(5.0, 5.0, 6.0, 6.0), 3);
        assert!(tiles.is_empty());
    }

    // ============================================================================
    // View change detection
    // ============================================================================

    #[test]
    fn view_changed_tracks_corner_set() {
        let mut tiler = tiler();
        let view = Bounds::new(-0.9, -0.9, 0.9, 0.9);

        assert!(tiler.view_changed(&view, 2));
        assert!(!tiler.view_changed(&view, 2));

        // Sub-tile nudge keeps the same corner set.
        assert!(!tiler.view_changed(&view.translated(0.01, 0.0), 2));

        assert!(tiler.view_changed(&view.translated(0.6, 0.0), 2));
        assert!(tiler.view_changed(&view.translated(0.6, 0.0), 3));
    }

    #[test]
    fn forget_view_and_resolution_reset() {
        let mut tiler = tiler();
        let view = Bounds::new(-1.0, -1.0, 1.0, 1.0);
        tiler.view_changed(&view, 2);

        tiler.forget_view();
        assert!(tiler.view_changed(&view, 2));

        tiler.set_resolution(64);
        assert!(!tiler.view_changed(&view, 2));

        tiler.set_resolution(128);
        assert_eq!(tiler.resolution(), 128);
        assert!(tiler.view_changed(&view, 2));
    }
}
