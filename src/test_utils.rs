use std::collections::HashMap;
use std::fmt::Debug;

use super::geometry::{LatLon, Polygon};
use super::zones::{GridCity, JoinPolicy, ZoneGeometry, ZoneTable};


/// Checks that the contents of two hashmaps are the same.
pub fn compare_hashmaps<KK, VV>(query_map: &HashMap<KK, VV>, true_map: &HashMap<KK, VV>)
    where KK: Debug + Eq + std::hash::Hash,
    VV: Debug + PartialEq,
{
    assert_eq!(query_map.len(), true_map.len());
    for (true_key, true_val) in true_map {
        match query_map.get(true_key) {
            Some(val) => assert_eq!(val, true_val),
            None => assert!(false, "Key {:?} missing!", true_key),
        }
    }
}

/// Square zones of side 0.01 degrees in a row along the equator, with ids 1, 2, ...
/// Production must already be balanced against attraction.
pub fn line_zones(production: &[f64], attraction: &[f64]) -> ZoneTable {
    let mut geoms = vec![];
    let mut homes = HashMap::new();
    let mut empls = HashMap::new();
    for (ii, (prod, attr)) in production.iter().zip(attraction).enumerate() {
        let id = ii as u32 + 1;
        let min_lon = ii as f64 * 0.01;
        geoms.push(ZoneGeometry {
            id,
            name: format!("zone {}", id),
            boundary: Polygon::rectangle(min_lon, -0.005, min_lon + 0.01, 0.005),
        });
        homes.insert(id, *prod);
        empls.insert(id, *attr);
    }
    ZoneTable::generate(geoms, &homes, &empls, JoinPolicy::Strict).unwrap()
}

/// A grid of square zones with uniform demand.
pub fn grid_zones(num_x_zones: usize, num_y_zones: usize) -> ZoneTable {
    let grid = GridCity {
        num_x_zones,
        num_y_zones,
        zone_size_deg: 0.01,
        origin: LatLon::new(0., 0.),
        num_workers: 100.,
    };
    let mut rng = rand::rngs::mock::StepRng::new(1 << 62, 0);
    let (geoms, homes, empls) = grid.generate(&mut rng);
    ZoneTable::generate(geoms, &homes, &empls, JoinPolicy::Strict).unwrap()
}
