use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const PACK_XZ_BITS: u32 = 26;
const PACK_Y_BITS: u32 = 12;
const PACK_XZ_MASK: i64 = (1 << PACK_XZ_BITS) - 1;
const PACK_Y_MASK: i64 = (1 << PACK_Y_BITS) - 1;

/// Integer block coordinate in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub const fn with_y(self, y: i32) -> Self {
        Self {
            x: self.x,
            y,
            z: self.z,
        }
    }

    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Packs the coordinate into a single search key (26 bits x, 26 bits z,
    /// 12 bits y). Distinct in-range points never collide.
    pub fn pack_key(self) -> u64 {
        let x = self.x as i64 & PACK_XZ_MASK;
        let z = self.z as i64 & PACK_XZ_MASK;
        let y = self.y as i64 & PACK_Y_MASK;
        ((x << (PACK_XZ_BITS + PACK_Y_BITS)) | (z << PACK_Y_BITS) | y) as u64
    }

    pub fn xz_distance(self, other: GridPoint) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dz * dz).sqrt()
    }
}

/// Material classes the walkability predicate cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    #[default]
    Air,
    Solid,
    Water,
    Lava,
    Fire,
    Cactus,
    MagmaBlock,
    SweetBerryBush,
    PowderSnow,
}

impl BlockKind {
    pub fn is_solid(self) -> bool {
        matches!(self, Self::Solid | Self::Cactus | Self::MagmaBlock)
    }

    pub fn is_hazardous(self) -> bool {
        matches!(
            self,
            Self::Lava
                | Self::Fire
                | Self::Cactus
                | Self::MagmaBlock
                | Self::SweetBerryBush
                | Self::PowderSnow
        )
    }
}

/// Read access to the block at a coordinate, supplied by the host world.
pub trait BlockView {
    fn block_at(&self, point: GridPoint) -> BlockKind;
}

/// Decides whether a player can stand with their feet at `point`.
pub trait WalkabilityOracle {
    fn is_walkable(&self, point: GridPoint) -> bool;
}

impl<T: WalkabilityOracle + ?Sized> WalkabilityOracle for &T {
    fn is_walkable(&self, point: GridPoint) -> bool {
        (**self).is_walkable(point)
    }
}

/// Standard standing rule over a block view: feet and head clear, floor solid,
/// nothing hazardous in any of the three cells.
#[derive(Debug, Clone, Copy)]
pub struct BlockWalkability<V> {
    view: V,
}

impl<V: BlockView> BlockWalkability<V> {
    pub fn new(view: V) -> Self {
        Self { view }
    }
}

impl<V: BlockView> WalkabilityOracle for BlockWalkability<V> {
    fn is_walkable(&self, point: GridPoint) -> bool {
        let feet = self.view.block_at(point);
        let head = self.view.block_at(point.above());
        let floor = self.view.block_at(point.below());
        !feet.is_solid()
            && !feet.is_hazardous()
            && !head.is_solid()
            && !head.is_hazardous()
            && floor.is_solid()
            && !floor.is_hazardous()
    }
}

/// Sparse in-memory block store. Unset cells read as air.
#[derive(Debug, Clone, Default)]
pub struct VoxelGrid {
    blocks: HashMap<GridPoint, BlockKind>,
}

impl VoxelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solid floor covering the inclusive XZ rectangle at height `y`.
    pub fn with_floor(min_x: i32, max_x: i32, min_z: i32, max_z: i32, y: i32) -> Self {
        let mut grid = Self::new();
        grid.fill(
            GridPoint::new(min_x, y, min_z),
            GridPoint::new(max_x, y, max_z),
            BlockKind::Solid,
        );
        grid
    }

    pub fn set(&mut self, point: GridPoint, kind: BlockKind) {
        if kind == BlockKind::Air {
            self.blocks.remove(&point);
        } else {
            self.blocks.insert(point, kind);
        }
    }

    /// Fills the inclusive cuboid spanned by two corners.
    pub fn fill(&mut self, a: GridPoint, b: GridPoint, kind: BlockKind) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set(GridPoint::new(x, y, z), kind);
                }
            }
        }
    }
}

impl BlockView for VoxelGrid {
    fn block_at(&self, point: GridPoint) -> BlockKind {
        self.blocks.get(&point).copied().unwrap_or_default()
    }
}

impl<V: BlockView + ?Sized> BlockView for &V {
    fn block_at(&self, point: GridPoint) -> BlockKind {
        (**self).block_at(point)
    }
}

/// Probes the column at `point` for the nearest walkable height, alternating
/// downward and upward (y, y-1, y+1, y-2, y+2, ...) up to `span` blocks.
pub fn snap_to_walkable(
    oracle: &impl WalkabilityOracle,
    point: GridPoint,
    span: i32,
) -> Option<GridPoint> {
    if oracle.is_walkable(point) {
        return Some(point);
    }
    for delta in 1..=span.max(0) {
        let down = point.offset(0, -delta, 0);
        if oracle.is_walkable(down) {
            return Some(down);
        }
        let up = point.offset(0, delta, 0);
        if oracle.is_walkable(up) {
            return Some(up);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_key_distinguishes_negative_and_positive_axes() {
        let a = GridPoint::new(-1, 64, 5);
        let b = GridPoint::new(1, 64, 5);
        let c = GridPoint::new(-1, 64, -5);
        assert_ne!(a.pack_key(), b.pack_key());
        assert_ne!(a.pack_key(), c.pack_key());
        assert_eq!(a.pack_key(), GridPoint::new(-1, 64, 5).pack_key());
    }

    #[test]
    fn walkable_requires_floor_and_two_clear_cells() {
        let mut grid = VoxelGrid::with_floor(0, 4, 0, 4, 0);
        grid.set(GridPoint::new(2, 2, 2), BlockKind::Solid);
        let oracle = BlockWalkability::new(grid);

        assert!(oracle.is_walkable(GridPoint::new(1, 1, 1)));
        assert!(!oracle.is_walkable(GridPoint::new(1, 2, 1)), "no floor");
        assert!(!oracle.is_walkable(GridPoint::new(2, 1, 2)), "head blocked");
        assert!(!oracle.is_walkable(GridPoint::new(9, 1, 9)), "outside floor");
    }

    #[test]
    fn hazardous_floor_is_not_walkable() {
        let mut grid = VoxelGrid::with_floor(0, 4, 0, 4, 0);
        grid.set(GridPoint::new(3, 0, 3), BlockKind::MagmaBlock);
        grid.set(GridPoint::new(1, 1, 3), BlockKind::Fire);
        let oracle = BlockWalkability::new(grid);

        assert!(!oracle.is_walkable(GridPoint::new(3, 1, 3)));
        assert!(!oracle.is_walkable(GridPoint::new(1, 1, 3)));
    }

    #[test]
    fn snap_prefers_the_closest_height_and_checks_below_first() {
        let mut grid = VoxelGrid::with_floor(0, 2, 0, 2, 0);
        grid.set(GridPoint::new(1, 4, 1), BlockKind::Solid);
        let oracle = BlockWalkability::new(grid);

        // Both y=1 and y=5 are two blocks away; below wins the tie.
        let snapped = snap_to_walkable(&oracle, GridPoint::new(1, 3, 1), 8);
        assert_eq!(snapped, Some(GridPoint::new(1, 1, 1)));

        let snapped = snap_to_walkable(&oracle, GridPoint::new(1, 6, 1), 8);
        assert_eq!(snapped, Some(GridPoint::new(1, 5, 1)));

        let snapped = snap_to_walkable(&oracle, GridPoint::new(0, 6, 0), 8);
        assert_eq!(snapped, Some(GridPoint::new(0, 1, 0)));

        assert_eq!(snap_to_walkable(&oracle, GridPoint::new(0, 20, 0), 8), None);
    }
}
