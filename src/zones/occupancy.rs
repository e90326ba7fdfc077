use serde::Serialize;
use uom::si::f64::Time;
use uom::si::time::second;

use super::ZoneSet;
use crate::analysis::TimeSeries;

/// Time one tracked point spent inside one zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoneOccupancy {
    pub zone: String,
    pub frames_inside: usize,
    pub seconds_inside: f64,
    /// Visits to the zone, counting a track that starts inside as one
    pub entries: usize,
    /// Share of the valid frames spent inside
    pub fraction_inside: f64,
}

/// Occupancy of every zone, in zone definition order.
///
/// Frames without a valid position are ignored: they neither enter nor
/// leave a zone.
pub fn zone_occupancy(series: &TimeSeries, zones: &ZoneSet) -> Vec<ZoneOccupancy> {
    let valid_frames = series.valid_count();

    zones
        .iter()
        .map(|zone| {
            let mut frames_inside = 0;
            let mut entries = 0;
            let mut was_inside = false;
            for row in series.valid_points() {
                let inside = zone.contains((row.x, row.y));
                if inside {
                    frames_inside += 1;
                    if !was_inside {
                        entries += 1;
                    }
                }
                was_inside = inside;
            }

            let time_inside = Time::new::<second>(frames_inside as f64 / series.fps);
            ZoneOccupancy {
                zone: zone.name.clone(),
                frames_inside,
                seconds_inside: time_inside.get::<second>(),
                entries,
                fraction_inside: if valid_frames > 0 {
                    frames_inside as f64 / valid_frames as f64
                } else {
                    0.0
                },
            }
        })
        .collect()
}
