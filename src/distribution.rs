use ndarray::prelude::*;
use ndarray::Zip;

use super::error::{ModelError, Result};
use super::matrix::{OdTriple, ZoneMatrix};
use super::zones::{margins_match, ZoneTable};


/// Distance-decay friction, exp(-beta * distance).
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CostModel {
    pub beta: f64,
}

impl CostModel {
    pub fn new(beta: f64) -> CostModel {
        CostModel{beta}
    }

    pub fn cost(&self, distance_km: f64) -> f64 {
        (-self.beta * distance_km).exp()
    }

    /// Friction between every pair of zone centroids.
    pub fn cost_matrix(&self, zones: &ZoneTable) -> Result<ZoneMatrix> {
        let mut costs = zones.distance_matrix();
        costs.par_mapv_inplace(|dist| self.cost(dist));
        ZoneMatrix::new(zones.zone_ids(), costs)
    }
}

/// A one-dimensional margin: a target total per zone.
#[derive(PartialEq, Debug, Clone)]
pub struct Margin {
    pub zone_ids: Vec<u32>,
    pub values: Array<f64, Ix1>,
}

impl Margin {
    pub fn new(zone_ids: Vec<u32>, values: Array<f64, Ix1>) -> Result<Margin> {
        if zone_ids.len() != values.len() {
            return Err(ModelError::Shape(format!("{} zone labels for a margin of length {}",
                                                 zone_ids.len(), values.len())));
        }
        Ok(Margin{zone_ids, values})
    }

    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    // the margin's values reordered to match `zone_ids`
    fn aligned_to(&self, matrix: &ZoneMatrix) -> Result<Array<f64, Ix1>> {
        if self.zone_ids.len() != matrix.len() {
            return Err(ModelError::Shape(format!("margin covers {} zones, matrix covers {}",
                                                 self.zone_ids.len(), matrix.len())));
        }
        let mut aligned = Array::zeros(matrix.len());
        for (id, value) in self.zone_ids.iter().zip(self.values.iter()) {
            let idx = matrix.index_of(*id).ok_or_else(||
                ModelError::Shape(format!("margin zone {} is not in the seed matrix", id)))?;
            aligned[idx] = *value;
        }
        Ok(aligned)
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct IpfSettings {
    /// Maximum relative deviation of any row or column sum from its target.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for IpfSettings {
    fn default() -> IpfSettings {
        IpfSettings{tolerance: 1e-6, max_iterations: 500}
    }
}

/// Balances a seed matrix to production and attraction margins by iterative proportional
/// fitting.
pub struct Distributor {
    settings: IpfSettings,
}

impl Distributor {
    pub fn new(settings: IpfSettings) -> Distributor {
        Distributor{settings}
    }

    /// Distributes trips given the seed in long form.  Returns the trip matrix with origins as
    /// rows, in the order of the production margin.
    pub fn distribute(&self, seed: &[OdTriple], production: &Margin, attraction: &Margin)
                      -> Result<ZoneMatrix> {
        if !margins_match(production.total(), attraction.total(), self.settings.tolerance) {
            return Err(ModelError::UnbalancedMargins{
                production: production.total(),
                attraction: attraction.total(),
            });
        }
        let mut trips = ZoneMatrix::pivot(production.zone_ids.clone(), seed)?;
        if trips.values().iter().any(|vv| !vv.is_finite() || *vv < 0.) {
            return Err(ModelError::Shape(String::from("seed values must be finite and >= 0")));
        }
        let row_targets = production.aligned_to(&trips)?;
        let col_targets = attraction.aligned_to(&trips)?;

        let iterations = self.fit(trips.values_mut(), &row_targets, &col_targets)?;
        log::info!("IPF converged after {} iterations", iterations);
        Ok(trips)
    }

    // Returns the number of iterations taken.
    fn fit(&self, values: &mut Array<f64, Ix2>, row_targets: &Array<f64, Ix1>,
           col_targets: &Array<f64, Ix1>) -> Result<usize> {
        let mut residual = f64::INFINITY;
        for iteration in 1..=self.settings.max_iterations {
            Zip::from(values.rows_mut()).and(row_targets).par_for_each(|row, &target| {
                scale_to(row, target);
            });
            Zip::from(values.columns_mut()).and(col_targets).par_for_each(|col, &target| {
                scale_to(col, target);
            });

            residual = max_deviation(&values.sum_axis(Axis(1)), row_targets)
                .max(max_deviation(&values.sum_axis(Axis(0)), col_targets));
            log::debug!("IPF iteration {}: residual {:e}", iteration, residual);
            if residual <= self.settings.tolerance {
                return Ok(iteration);
            }
        }
        Err(ModelError::Convergence{iterations: self.settings.max_iterations, residual})
    }
}

// A lane that sums to zero can't be rescaled, and stays zero.
fn scale_to(mut lane: ArrayViewMut1<f64>, target: f64) {
    let sum = lane.sum();
    if sum > 0. {
        let factor = target / sum;
        lane.mapv_inplace(|vv| vv * factor);
    }
}

fn max_deviation(sums: &Array<f64, Ix1>, targets: &Array<f64, Ix1>) -> f64 {
    sums.iter().zip(targets.iter())
        .map(|(ss, tt)| (ss - tt).abs() / tt.abs().max(1.))
        .fold(0., f64::max)
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use approx::assert_relative_eq;

    use super::*;
    use super::super::geometry::Polygon;
    use super::super::zones::{JoinPolicy, ZoneGeometry};

    fn margins(ids: &[u32], prod: Array<f64, Ix1>, attr: Array<f64, Ix1>) -> (Margin, Margin) {
        (Margin::new(ids.to_vec(), prod).unwrap(), Margin::new(ids.to_vec(), attr).unwrap())
    }

    #[test]
    fn test_cost_function() {
        let model = CostModel::new(0.5);
        assert_relative_eq!(model.cost(0.), 1.);
        assert_relative_eq!(model.cost(2.), (-1f64).exp());
        // stronger decay with larger beta
        assert!(CostModel::new(1.).cost(2.) < model.cost(2.));
    }

    #[test]
    fn test_cost_matrix() {
        let geoms = vec![
            ZoneGeometry{id: 1, name: String::from("a"),
                         boundary: Polygon::rectangle(0., 0., 0.01, 0.01)},
            ZoneGeometry{id: 2, name: String::from("b"),
                         boundary: Polygon::rectangle(0.05, 0., 0.06, 0.01)},
        ];
        let counts: HashMap<u32, f64> = [(1, 1.), (2, 1.)].iter().cloned().collect();
        let zones = ZoneTable::generate(geoms, &counts, &counts, JoinPolicy::Strict).unwrap();
        let model = CostModel::new(0.1);
        let costs = model.cost_matrix(&zones).unwrap();
        let dist = zones.zones()[0].centroid.haversine_km(&zones.zones()[1].centroid);
        assert_relative_eq!(costs.get(1, 1).unwrap(), 1.);
        assert_relative_eq!(costs.get(1, 2).unwrap(), (-0.1 * dist).exp());
        assert_relative_eq!(costs.get(1, 2).unwrap(), costs.get(2, 1).unwrap());
    }

    #[test]
    fn test_ipf_matches_margins() {
        let ids = [1, 2, 3, 4];
        let seed = ZoneMatrix::new(ids.to_vec(), array![
            [1.0, 0.5, 0.2, 0.1],
            [0.5, 1.0, 0.5, 0.2],
            [0.2, 0.5, 1.0, 0.5],
            [0.1, 0.2, 0.5, 1.0],
        ]).unwrap();
        let (prod, attr) = margins(&ids, array![100., 250., 50., 100.],
                                   array![300., 50., 75., 75.]);
        let trips = Distributor::new(IpfSettings::default())
            .distribute(&seed.melt(), &prod, &attr).unwrap();

        for (sum, target) in trips.row_sums().iter().zip(prod.values.iter()) {
            assert_relative_eq!(*sum, *target, max_relative=1e-6);
        }
        for (sum, target) in trips.col_sums().iter().zip(attr.values.iter()) {
            assert_relative_eq!(*sum, *target, max_relative=1e-6);
        }
        assert!(trips.values().iter().all(|vv| *vv >= 0.));
    }

    #[test]
    fn test_ipf_margin_order_differs() {
        let ids = [1, 2];
        let seed = ZoneMatrix::new(ids.to_vec(), Array::ones((2, 2))).unwrap();
        let prod = Margin::new(vec![2, 1], array![30., 10.]).unwrap();
        let attr = Margin::new(vec![1, 2], array![20., 20.]).unwrap();
        let trips = Distributor::new(IpfSettings::default())
            .distribute(&seed.melt(), &prod, &attr).unwrap();
        // rows follow the production margin order
        assert_eq!(trips.zone_ids(), &[2, 1]);
        assert_relative_eq!(trips.row_sums()[0], 30., max_relative=1e-6);
        assert_relative_eq!(trips.get(1, 1).unwrap() + trips.get(2, 1).unwrap(), 20.,
                            max_relative=1e-6);
    }

    #[test]
    fn test_ipf_zero_margins() {
        let ids = [1, 2, 3];
        let seed = ZoneMatrix::new(ids.to_vec(), Array::ones((3, 3))).unwrap();
        let (prod, attr) = margins(&ids, array![10., 0., 10.], array![0., 20., 0.]);
        let trips = Distributor::new(IpfSettings::default())
            .distribute(&seed.melt(), &prod, &attr).unwrap();
        assert_relative_eq!(trips.get(1, 2).unwrap(), 10., max_relative=1e-9);
        assert_relative_eq!(trips.get(3, 2).unwrap(), 10., max_relative=1e-9);
        assert_relative_eq!(trips.total(), 20., max_relative=1e-9);
    }

    #[test]
    fn test_ipf_unbalanced() {
        let ids = [1, 2];
        let seed = ZoneMatrix::new(ids.to_vec(), Array::ones((2, 2))).unwrap();
        let (prod, attr) = margins(&ids, array![10., 10.], array![5., 5.]);
        let result = Distributor::new(IpfSettings::default()).distribute(&seed.melt(), &prod,
                                                                          &attr);
        assert!(matches!(result, Err(ModelError::UnbalancedMargins{..})));
    }

    #[test]
    fn test_ipf_no_convergence() {
        // zone 2 can't send any trips, but its production is positive
        let ids = [1, 2];
        let seed = ZoneMatrix::new(ids.to_vec(), array![[1., 1.], [0., 0.]]).unwrap();
        let (prod, attr) = margins(&ids, array![10., 10.], array![10., 10.]);
        let settings = IpfSettings{tolerance: 1e-6, max_iterations: 25};
        match Distributor::new(settings).distribute(&seed.melt(), &prod, &attr) {
            Err(ModelError::Convergence{iterations, residual}) => {
                assert_eq!(iterations, 25);
                assert!(residual > 1e-6);
            }
            other => panic!("expected a convergence error, got {:?}", other),
        }
    }
}
