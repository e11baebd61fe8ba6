mod astar;
mod grid;
mod route;
mod straight_line;

pub use astar::{GridPathfinder, PathfinderConfig};
pub use grid::{
    snap_to_walkable, BlockKind, BlockView, BlockWalkability, GridPoint, VoxelGrid,
    WalkabilityOracle,
};
pub use route::{Route, RouteKind};
pub use straight_line::{straight_line_route, MIN_STRAIGHT_LINE_STEP};
