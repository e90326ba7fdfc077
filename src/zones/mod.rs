// Named 2-D zones built from a small definition language

pub mod geometry;
pub mod occupancy;
pub mod parser;

use std::path::Path;

use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon, Point};
use log::{debug, info};

use crate::PawtrackError;

pub use geometry::DEFAULT_CIRCLE_RESOLUTION;
pub use occupancy::{ZoneOccupancy, zone_occupancy};
use parser::{SetOp, ShapeExpr, parse_statements};

#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    pub name: String,
    pub shape: MultiPolygon<f64>,
}

/// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`.
pub type Bounds = (f64, f64, f64, f64);

/// Zones in the order they were first defined.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    pub fn parse(source: &str, circle_resolution: usize) -> Result<Self, PawtrackError> {
        let mut set = ZoneSet::default();

        for statement in parse_statements(source)? {
            let name = statement.name;
            let line = statement.line;
            let shape = match statement.shape {
                ShapeExpr::Polygon(vertices) => {
                    let polygon = geometry::simple_polygon(&vertices).map_err(|reason| {
                        PawtrackError::InvalidPolygon {
                            name: name.clone(),
                            line,
                            reason,
                        }
                    })?;
                    MultiPolygon::new(vec![polygon])
                }
                ShapeExpr::Circle { center, radius } => {
                    let polygon = geometry::circle(center, radius, circle_resolution).map_err(
                        |reason| PawtrackError::InvalidCircle {
                            name: name.clone(),
                            line,
                            reason,
                        },
                    )?;
                    MultiPolygon::new(vec![polygon])
                }
                ShapeExpr::Operation { left, op, right } => {
                    let lookup = |zone: &str| {
                        set.find(zone)
                            .ok_or_else(|| PawtrackError::UnknownZoneReference {
                                zone: zone.to_string(),
                                line,
                            })
                    };
                    let a = &lookup(&left)?.shape;
                    let b = &lookup(&right)?.shape;
                    let result = match op {
                        SetOp::Union => a.union(b),
                        SetOp::Intersection => a.intersection(b),
                        SetOp::Difference => a.difference(b),
                        SetOp::SymmetricDifference => a.xor(b),
                    };
                    if result.0.is_empty() || result.unsigned_area() <= 0.0 {
                        return Err(PawtrackError::EmptyZone { name, line });
                    }
                    result
                }
            };
            debug!("Defined zone '{}' on line {}", name, line);
            set.insert(name, shape);
        }

        info!("Parsed {} zones", set.len());
        Ok(set)
    }

    pub fn from_file(path: &Path, circle_resolution: usize) -> Result<Self, PawtrackError> {
        let source =
            std::fs::read_to_string(path).map_err(|e| PawtrackError::ZoneFileError { source: e })?;
        Self::parse(&source, circle_resolution)
    }

    /// Reassigning a name replaces the shape but keeps its position.
    fn insert(&mut self, name: String, shape: MultiPolygon<f64>) {
        match self.zones.iter_mut().find(|zone| zone.name == name) {
            Some(zone) => zone.shape = shape,
            None => self.zones.push(Zone { name, shape }),
        }
    }

    fn find(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    pub fn get(&self, name: &str) -> Result<&Zone, PawtrackError> {
        self.find(name).ok_or_else(|| PawtrackError::UnknownZone {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.zones.iter().map(|zone| zone.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// True when the point lies inside the zone or on its boundary.
    pub fn contains(&self, name: &str, point: (f64, f64)) -> Result<bool, PawtrackError> {
        Ok(self.get(name)?.contains(point))
    }

    pub fn area(&self, name: &str) -> Result<f64, PawtrackError> {
        Ok(self.get(name)?.area())
    }

    pub fn perimeter(&self, name: &str) -> Result<f64, PawtrackError> {
        Ok(self.get(name)?.perimeter())
    }

    pub fn bounds(&self, name: &str) -> Result<Bounds, PawtrackError> {
        Ok(self.get(name)?.bounds())
    }
}

impl Zone {
    pub fn contains(&self, (x, y): (f64, f64)) -> bool {
        let point = Point::new(x, y);
        self.shape.0.iter().any(|polygon| polygon.intersects(&point))
    }

    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    pub fn perimeter(&self) -> f64 {
        geometry::perimeter(&self.shape)
    }

    pub fn bounds(&self) -> Bounds {
        self.shape
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
            .unwrap_or((f64::NAN, f64::NAN, f64::NAN, f64::NAN))
    }
}
