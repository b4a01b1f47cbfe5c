use std::collections::HashMap;
use std::path::Path;

use ndarray::prelude::*;
use ndarray::Zip;

use super::error::{ModelError, Result};


/// One cell of a melted matrix.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct OdTriple {
    pub origin: u32,
    pub destination: u32,
    pub value: f64,
}

/// A list of (origin, destination, value) triples.
pub type LongTable = Vec<OdTriple>;

/// A square matrix whose rows and columns are both labelled by zone ids, in the same order.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneMatrix {
    zone_ids: Vec<u32>,
    idxs_by_id: HashMap<u32, usize>,
    values: Array<f64, Ix2>,
}

impl ZoneMatrix {
    pub fn new(zone_ids: Vec<u32>, values: Array<f64, Ix2>) -> Result<ZoneMatrix> {
        let size = zone_ids.len();
        if values.dim() != (size, size) {
            return Err(ModelError::Shape(format!("{} zone labels for a {:?} matrix", size,
                                                 values.dim())));
        }
        let idxs_by_id = index_zone_ids(&zone_ids)?;
        Ok(ZoneMatrix{zone_ids, idxs_by_id, values})
    }

    pub fn zeros(zone_ids: Vec<u32>) -> Result<ZoneMatrix> {
        let size = zone_ids.len();
        ZoneMatrix::new(zone_ids, Array::zeros((size, size)))
    }

    pub fn zone_ids(&self) -> &[u32] {
        &self.zone_ids
    }

    pub fn len(&self) -> usize {
        self.zone_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zone_ids.is_empty()
    }

    pub fn values(&self) -> &Array<f64, Ix2> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array<f64, Ix2> {
        &mut self.values
    }

    pub fn index_of(&self, zone_id: u32) -> Option<usize> {
        self.idxs_by_id.get(&zone_id).copied()
    }

    pub fn get(&self, origin: u32, destination: u32) -> Option<f64> {
        let oi = self.index_of(origin)?;
        let di = self.index_of(destination)?;
        Some(self.values[[oi, di]])
    }

    pub fn row_sums(&self) -> Array<f64, Ix1> {
        self.values.sum_axis(Axis(1))
    }

    pub fn col_sums(&self) -> Array<f64, Ix1> {
        self.values.sum_axis(Axis(0))
    }

    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Element-wise product of two matrices over the same zones.
    pub fn hadamard(&self, other: &Array<f64, Ix2>) -> Result<ZoneMatrix> {
        if other.dim() != self.values.dim() {
            return Err(ModelError::Shape(format!("cannot multiply {:?} by {:?}",
                                                 self.values.dim(), other.dim())));
        }
        let mut values = self.values.clone();
        Zip::from(&mut values).and(other).for_each(|vv, &oo| *vv *= oo);
        Ok(ZoneMatrix{zone_ids: self.zone_ids.clone(), idxs_by_id: self.idxs_by_id.clone(),
                      values})
    }

    /// Flattens the matrix into one triple per cell, row-major.
    pub fn melt(&self) -> LongTable {
        self.values.indexed_iter().map(|((oi, di), value)| OdTriple {
            origin: self.zone_ids[oi],
            destination: self.zone_ids[di],
            value: *value,
        }).collect()
    }

    /// Rebuilds a matrix from triples.  Every (origin, destination) pair over `zone_ids` must
    /// appear exactly once.
    pub fn pivot(zone_ids: Vec<u32>, table: &[OdTriple]) -> Result<ZoneMatrix> {
        let size = zone_ids.len();
        let idxs_by_id = index_zone_ids(&zone_ids)?;
        let mut values = Array::zeros((size, size));
        let mut seen = Array::from_elem((size, size), false);
        for triple in table {
            let lookup = |id: u32| idxs_by_id.get(&id).copied().ok_or_else(||
                ModelError::Shape(format!("zone {} is not one of the matrix zones", id)));
            let oi = lookup(triple.origin)?;
            let di = lookup(triple.destination)?;
            if seen[[oi, di]] {
                return Err(ModelError::Shape(format!("duplicate cell {} -> {}", triple.origin,
                                                     triple.destination)));
            }
            seen[[oi, di]] = true;
            values[[oi, di]] = triple.value;
        }
        if let Some(((oi, di), _)) = seen.indexed_iter().find(|(_, filled)| !**filled) {
            return Err(ModelError::Shape(format!("missing cell {} -> {}", zone_ids[oi],
                                                 zone_ids[di])));
        }
        Ok(ZoneMatrix{zone_ids, idxs_by_id, values})
    }

    /// Writes the matrix as csv, one row per origin, with zone ids as the header.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec![String::from("ozone")];
        header.extend(self.zone_ids.iter().map(|id| id.to_string()));
        writer.write_record(&header)?;
        for (oi, row) in self.values.outer_iter().enumerate() {
            let mut record = vec![self.zone_ids[oi].to_string()];
            record.extend(row.iter().map(|vv| vv.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn index_zone_ids(zone_ids: &[u32]) -> Result<HashMap<u32, usize>> {
    let mut idxs_by_id = HashMap::new();
    for (idx, id) in zone_ids.iter().enumerate() {
        if idxs_by_id.insert(*id, idx).is_some() {
            return Err(ModelError::DuplicateZone(*id));
        }
    }
    Ok(idxs_by_id)
}
