use tracing::debug;

use super::grid::{snap_to_walkable, GridPoint, WalkabilityOracle};
use super::route::{Route, RouteKind};

/// Smallest sampling step accepted; finer steps add no new grid cells.
pub const MIN_STRAIGHT_LINE_STEP: f64 = 0.25;

/// Samples the XZ segment `from -> to` every `step` blocks and drops each
/// sample onto the nearest standing height. Samples whose column has no
/// standing spot within `probe_span` keep the previous height.
pub fn straight_line_route(
    oracle: &impl WalkabilityOracle,
    from: GridPoint,
    to: GridPoint,
    step: f64,
    probe_span: i32,
) -> Route {
    let dx = f64::from(to.x - from.x);
    let dz = f64::from(to.z - from.z);
    let length = (dx * dx + dz * dz).sqrt();
    if length < f64::EPSILON {
        return Route::empty();
    }

    let step = if step.is_finite() && step > 0.0 {
        step.max(MIN_STRAIGHT_LINE_STEP)
    } else {
        1.0
    };
    let samples = (length / step).ceil() as usize;
    let mut points: Vec<GridPoint> = Vec::with_capacity(samples + 1);
    let mut last_y = from.y;
    let mut unsnapped = 0usize;

    for index in 0..=samples {
        let t = (index as f64 * step / length).min(1.0);
        let raw = GridPoint::new(
            (f64::from(from.x) + dx * t).round() as i32,
            last_y,
            (f64::from(from.z) + dz * t).round() as i32,
        );
        let point = match snap_to_walkable(oracle, raw, probe_span) {
            Some(snapped) => snapped,
            None => {
                unsnapped += 1;
                raw
            }
        };
        last_y = point.y;
        if points.last() != Some(&point) {
            points.push(point);
        }
    }

    if unsnapped > 0 {
        debug!(unsnapped, total = points.len(), "straight_line_unsnapped_samples");
    }
    Route::from_points(points, RouteKind::StraightLine)
}
