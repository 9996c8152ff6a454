use crate::core::Ranker;
use crate::models::{Location, QueryPoint, RankedLocation};

/// Nearest queries never return more than this many locations.
pub(crate) const NEARBY_LIMIT: usize = 10;

/// Equatorial radius used by the haversine formula, in kilometers.
pub(crate) const EARTH_RADIUS_KM: f64 = 6378.137;

/// Great-circle distance in meters between two points given in degrees.
pub(crate) fn haversine_distance(from: QueryPoint, to: QueryPoint) -> f64 {
    let from_lat = from.latitude.to_radians();
    let to_lat = to.latitude.to_radians();
    let half_d_lat = ((to_lat - from_lat) / 2.0).sin();
    let half_d_lon = ((to.longitude.to_radians() - from.longitude.to_radians()) / 2.0).sin();
    let a = half_d_lat * half_d_lat + from_lat.cos() * to_lat.cos() * half_d_lon * half_d_lon;
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c * 1000.0
}

/// Exhaustive nearest-neighbor ranking. Every location is measured, so the
/// cost grows with the whole data set rather than with the neighborhood.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NearestRanker {
    limit: usize,
}

impl NearestRanker {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Ranker for NearestRanker {
    fn rank(&self, locations: Vec<Location>, point: QueryPoint) -> Vec<RankedLocation> {
        let mut ranked: Vec<RankedLocation> = locations
            .into_iter()
            .map(|loc| {
                let distance = haversine_distance(
                    QueryPoint {
                        longitude: loc.longitude,
                        latitude: loc.latitude,
                    },
                    point,
                );
                RankedLocation {
                    id: loc.id,
                    name: loc.name,
                    distance,
                }
            })
            .collect();
        // sort_by is stable: equal distances keep their input order
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked.truncate(self.limit);
        ranked
    }
}
