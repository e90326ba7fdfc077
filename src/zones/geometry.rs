use std::f64::consts::TAU;

use geo::{Area, Coord, Intersects, Line, LineString, MultiPolygon, Polygon};

pub const DEFAULT_CIRCLE_RESOLUTION: usize = 64;

/// Builds a simple polygon from its vertices, closing the ring if needed.
///
/// Repeated consecutive vertices are merged. Fails with a reason when there
/// are fewer than three distinct vertices, when two edges cross, or when the
/// enclosed area is zero.
pub fn simple_polygon(vertices: &[(f64, f64)]) -> Result<Polygon<f64>, String> {
    if vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err("coordinates must be finite numbers".to_string());
    }
    let mut ring = vertices.to_vec();
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    let polygon = Polygon::new(LineString::from(ring), vec![]);

    let edges: Vec<Line<f64>> = polygon.exterior().lines().collect();
    if edges.len() < 3 {
        return Err(format!(
            "a polygon needs at least 3 vertices, got {}",
            edges.len()
        ));
    }
    if let Some((first, second)) = crossing_edges(&edges) {
        return Err(format!("edges {first} and {second} intersect"));
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err("polygon has zero area".to_string());
    }
    Ok(polygon)
}

/// First pair of non-neighbouring ring edges that touch, by edge index.
fn crossing_edges(edges: &[Line<f64>]) -> Option<(usize, usize)> {
    let count = edges.len();
    for i in 0..count {
        for j in (i + 2)..count {
            // the last edge closes the ring onto the first one
            if i == 0 && j == count - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Regular polygon approximating a circle, `4 * resolution` segments.
pub fn circle(center: (f64, f64), radius: f64, resolution: usize) -> Result<Polygon<f64>, String> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(format!("radius must be positive, got {radius}"));
    }
    if !center.0.is_finite() || !center.1.is_finite() {
        return Err("center must be finite".to_string());
    }
    let segments = 4 * resolution.max(1);
    let ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            Coord {
                x: center.0 + radius * angle.cos(),
                y: center.1 + radius * angle.sin(),
            }
        })
        .collect();
    Ok(Polygon::new(LineString::from(ring), vec![]))
}

/// Boundary length of every ring, holes included.
pub fn perimeter(shape: &MultiPolygon<f64>) -> f64 {
    shape
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .flat_map(|ring| ring.lines())
        .map(|line| line.dx().hypot(line.dy()))
        .sum()
}
