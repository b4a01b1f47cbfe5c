use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use itertools::iproduct;
use ndarray::prelude::*;
use rand::Rng;

use super::error::{ModelError, Result};
use super::geometry::{haversine_distances, LatLon, Polygon};


pub static ZONE_ID_COLUMN: &str = "WARD_NO";
pub static ZONE_NAME_COLUMN: &str = "WARD_NAME";
pub static GEOMETRY_COLUMN: &str = "WKT";
pub static HOME_COLUMN: &str = "WORKING_POP";
pub static EMPLOYEE_COLUMN: &str = "EMPLOYEES_ESTIMATE";

// A convenience type for parsing csv data
type Row = HashMap<String, String>;

/// What to do with a zone whose demand row is missing.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum JoinPolicy {
    /// Drop the zone, as an inner join would, and log it.
    Drop,
    /// Fail generation.
    Strict,
}

/// A zone as it comes out of the supply (geometry) table.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneGeometry {
    pub id: u32,
    pub name: String,
    pub boundary: Polygon,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Zone {
    pub id: u32,
    pub name: String,
    pub boundary: Polygon,
    pub centroid: LatLon,
    pub production: f64,
    pub attraction: f64,
}

/// The balanced zone set, sorted by zone name.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneTable {
    zones: Vec<Zone>,
}

impl ZoneTable {
    /// Builds a table from already-balanced zones.  Fails if ids repeat, if the table is empty,
    /// or if total production and attraction differ.
    pub fn new(mut zones: Vec<Zone>) -> Result<ZoneTable> {
        if zones.is_empty() {
            return Err(ModelError::EmptyZoneTable);
        }
        let mut seen = HashSet::new();
        for zone in &zones {
            if !seen.insert(zone.id) {
                return Err(ModelError::DuplicateZone(zone.id));
            }
        }
        let production: f64 = zones.iter().map(|zz| zz.production).sum();
        let attraction: f64 = zones.iter().map(|zz| zz.attraction).sum();
        if !margins_match(production, attraction, 1e-9) {
            return Err(ModelError::UnbalancedMargins{production, attraction});
        }
        zones.sort_by(|aa, bb| aa.name.cmp(&bb.name).then(aa.id.cmp(&bb.id)));
        Ok(ZoneTable{zones})
    }

    /// Joins zone geometries with home and employment counts, keyed by zone id.  Production is
    /// rescaled so that it sums to total attraction.
    pub fn generate(geometries: Vec<ZoneGeometry>, homes: &HashMap<u32, f64>,
                    employees: &HashMap<u32, f64>, policy: JoinPolicy) -> Result<ZoneTable> {
        let mut zones = vec![];
        for geom in geometries {
            let joined = match (homes.get(&geom.id), employees.get(&geom.id)) {
                (Some(home), Some(empl)) => Some((*home, *empl)),
                (None, _) => {
                    handle_missing_row(&geom, "home locations", policy)?;
                    None
                }
                (_, None) => {
                    handle_missing_row(&geom, "employee locations", policy)?;
                    None
                }
            };
            if let Some((production, attraction)) = joined {
                let centroid = geom.boundary.centroid();
                zones.push(Zone {
                    id: geom.id,
                    name: geom.name,
                    boundary: geom.boundary,
                    centroid,
                    production,
                    attraction,
                });
            }
        }
        if zones.is_empty() {
            return Err(ModelError::EmptyZoneTable);
        }

        // make the sums equal, so that IPF can converge
        let production: f64 = zones.iter().map(|zz| zz.production).sum();
        let attraction: f64 = zones.iter().map(|zz| zz.attraction).sum();
        if !(production > 0.) || !production.is_finite() || !attraction.is_finite() {
            return Err(ModelError::UnbalancedMargins{production, attraction});
        }
        let factor = attraction / production;
        log::info!("scaling production of {} zones by {}", zones.len(), factor);
        for zone in zones.iter_mut() {
            zone.production *= factor;
        }
        ZoneTable::new(zones)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone_ids(&self) -> Vec<u32> {
        self.zones.iter().map(|zz| zz.id).collect()
    }

    pub fn production(&self) -> Array<f64, Ix1> {
        self.zones.iter().map(|zz| zz.production).collect()
    }

    pub fn attraction(&self) -> Array<f64, Ix1> {
        self.zones.iter().map(|zz| zz.attraction).collect()
    }

    pub fn centroids(&self) -> Vec<LatLon> {
        self.zones.iter().map(|zz| zz.centroid).collect()
    }

    /// Great-circle distances between all zone centroids, in km.
    pub fn distance_matrix(&self) -> Array<f64, Ix2> {
        haversine_distances(&self.centroids())
    }

    /// Writes the merged supply and demand table.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&[ZONE_NAME_COLUMN, ZONE_ID_COLUMN, "centroid_lat", "centroid_lon",
                              "Production", "Attraction"])?;
        for zone in &self.zones {
            writer.write_record(&[
                zone.name.clone(),
                zone.id.to_string(),
                zone.centroid.lat.to_string(),
                zone.centroid.lon.to_string(),
                zone.production.to_string(),
                zone.attraction.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn handle_missing_row(geom: &ZoneGeometry, table: &str, policy: JoinPolicy) -> Result<()> {
    match policy {
        JoinPolicy::Strict => Err(ModelError::DataJoin {
            zone: geom.id,
            name: geom.name.clone(),
            table: String::from(table),
        }),
        JoinPolicy::Drop => {
            log::warn!("dropping zone {} ({}): no row in the {} table", geom.id, geom.name,
                       table);
            Ok(())
        }
    }
}

pub fn margins_match(production: f64, attraction: f64, tolerance: f64) -> bool {
    (production - attraction).abs() <= tolerance * production.abs().max(attraction.abs()).max(1.)
}

fn get_field<'a>(row: &'a Row, column: &str) -> Result<&'a str> {
    row.get(column).map(|ss| ss.trim()).ok_or_else(||
        ModelError::Parse{field: String::from(column), value: String::from("<missing column>")})
}

fn parse_field<T: std::str::FromStr>(row: &Row, column: &str) -> Result<T> {
    let value = get_field(row, column)?;
    value.parse().map_err(|_| ModelError::Parse{field: String::from(column),
                                                value: String::from(value)})
}

/// Reads the supply table: one row per zone with an id, a name, and a WKT polygon.
pub fn load_zone_geometries(csvpath: &Path) -> Result<Vec<ZoneGeometry>> {
    let file = File::open(csvpath)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut geometries = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        geometries.push(ZoneGeometry {
            id: parse_field(&row, ZONE_ID_COLUMN)?,
            name: String::from(get_field(&row, ZONE_NAME_COLUMN)?),
            boundary: Polygon::from_wkt(get_field(&row, GEOMETRY_COLUMN)?)?,
        });
    }
    log::info!("read {} zone geometries from {}", geometries.len(), csvpath.display());
    Ok(geometries)
}

/// Reads one numeric demand column keyed by zone id.  Later duplicates of a zone are ignored.
pub fn load_demand(csvpath: &Path, column: &str) -> Result<HashMap<u32, f64>> {
    let file = File::open(csvpath)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut demand = HashMap::new();
    for result in reader.deserialize() {
        let row: Row = result?;
        let id: u32 = parse_field(&row, ZONE_ID_COLUMN)?;
        let value: f64 = parse_field(&row, column)?;
        if !value.is_finite() || value < 0. {
            return Err(ModelError::Parse{field: String::from(column), value: value.to_string()});
        }
        if demand.contains_key(&id) {
            log::warn!("zone {} appears more than once in {}", id, csvpath.display());
            continue;
        }
        demand.insert(id, value);
    }
    Ok(demand)
}

/// Parameters of a synthetic grid of square zones.
#[derive(PartialEq, Debug, Clone)]
pub struct GridCity {
    pub num_x_zones: usize,
    pub num_y_zones: usize,
    pub zone_size_deg: f64,
    pub origin: LatLon,
    pub num_workers: f64,
}

impl GridCity {
    /// Generates square zones with random home and employment counts.  Both totals equal
    /// `num_workers` up to the random weights.
    pub fn generate<RR>(&self, rng: &mut RR)
                        -> (Vec<ZoneGeometry>, HashMap<u32, f64>, HashMap<u32, f64>)
                        where RR: Rng {
        let mut geometries = vec![];
        let mut homes = HashMap::new();
        let mut employees = HashMap::new();
        let num_zones = self.num_x_zones * self.num_y_zones;
        let home_weights: Vec<f64> = (0..num_zones).map(|_| rng.gen::<f64>()).collect();
        // employment is concentrated, so square the weights
        let empl_weights: Vec<f64> = (0..num_zones).map(|_| rng.gen::<f64>().powi(2)).collect();
        let home_total: f64 = home_weights.iter().sum();
        let empl_total: f64 = empl_weights.iter().sum();

        for (y_idx, x_idx) in iproduct!(0..self.num_y_zones, 0..self.num_x_zones) {
            let idx = y_idx * self.num_x_zones + x_idx;
            let id = idx as u32 + 1;
            let min_lon = self.origin.lon + x_idx as f64 * self.zone_size_deg;
            let min_lat = self.origin.lat + y_idx as f64 * self.zone_size_deg;
            let boundary = Polygon::rectangle(min_lon, min_lat, min_lon + self.zone_size_deg,
                                              min_lat + self.zone_size_deg);
            geometries.push(ZoneGeometry{id, name: format!("Zone {:03}", id), boundary});
            homes.insert(id, home_weights[idx] * self.num_workers / home_total);
            employees.insert(id, empl_weights[idx] * self.num_workers / empl_total);
        }
        (geometries, homes, employees)
    }
}
