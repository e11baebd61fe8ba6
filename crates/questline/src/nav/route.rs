use super::grid::GridPoint;

/// How a route was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// No usable route.
    Empty,
    /// A* reached the goal tolerance.
    Complete,
    /// A* gave up; the route ends at the explored point closest to the goal.
    Partial,
    /// Terrain-snapped straight line, used when A* finds nothing.
    StraightLine,
}

/// Ordered waypoints from start to goal. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<GridPoint>,
    kind: RouteKind,
}

impl Route {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            kind: RouteKind::Empty,
        }
    }

    pub(crate) fn from_points(points: Vec<GridPoint>, kind: RouteKind) -> Self {
        if points.is_empty() {
            return Self::empty();
        }
        Self { points, kind }
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<GridPoint> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<GridPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<GridPoint> {
        self.points.last().copied()
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::empty()
    }
}
