use ndarray::prelude::*;
use rayon::prelude::*;

use super::error::{ModelError, Result};
use super::matrix::ZoneMatrix;


/// A utility linear in distance: slope * distance + intercept.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ModeUtility {
    pub slope: f64,
    pub intercept: f64,
}

impl ModeUtility {
    pub fn new(slope: f64, intercept: f64) -> ModeUtility {
        ModeUtility{slope, intercept}
    }

    pub fn utility(&self, distance_km: f64) -> f64 {
        self.slope * distance_km + self.intercept
    }
}

/// A named set of modes and their utilities.  Mode order is preserved in all outputs.
#[derive(PartialEq, Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub modes: Vec<(String, ModeUtility)>,
}

impl Scenario {
    pub fn new(name: &str, modes: Vec<(String, ModeUtility)>) -> Scenario {
        Scenario{name: String::from(name), modes}
    }

    pub fn mode_names(&self) -> Vec<&str> {
        self.modes.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The three scenarios of the Bangalore study: a base case, a bus bias, and a car penalty.
    pub fn defaults() -> Vec<Scenario> {
        let modes = |bus_bias: f64, car_bias: f64| vec![
            (String::from("walking"), ModeUtility::new(-0.05, 0.)),
            (String::from("bus"), ModeUtility::new(-0.03, bus_bias)),
            (String::from("car"), ModeUtility::new(-0.01, car_bias)),
        ];
        vec![
            Scenario::new("Scenario 1", modes(0., 0.)),
            Scenario::new("Scenario 2", modes(0.75, 0.)),
            Scenario::new("Scenario 3", modes(0., -0.75)),
        ]
    }
}

/// Multinomial logit over the given utilities.  Returns `None` if there are no utilities or
/// any of them is not finite.
pub fn logit_probabilities(utilities: &[f64]) -> Option<Vec<f64>> {
    if utilities.is_empty() || utilities.iter().any(|uu| !uu.is_finite()) {
        return None;
    }
    // shift by the max so that every exponent is <= 0 and the denominator is >= 1
    let max_utility = utilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = utilities.iter().map(|uu| (uu - max_utility).exp()).collect();
    let total: f64 = exps.iter().sum();
    if !(total > 0.) || !total.is_finite() {
        return None;
    }
    Some(exps.into_iter().map(|ee| ee / total).collect())
}

/// Trips split by mode, in scenario mode order.
#[derive(PartialEq, Debug, Clone)]
pub struct ModalTrips {
    pub modes: Vec<(String, ZoneMatrix)>,
}

impl ModalTrips {
    /// Share of all trips taken by each mode.  All shares are zero if there are no trips.
    pub fn modal_split(&self) -> Vec<(String, f64)> {
        let totals: Vec<f64> = self.modes.iter().map(|(_, mm)| mm.total()).collect();
        let grand_total: f64 = totals.iter().sum();
        self.modes.iter().zip(totals).map(|((name, _), total)| {
            let share = if grand_total > 0. { total / grand_total } else { 0. };
            (name.clone(), share)
        }).collect()
    }

    pub fn get(&self, mode: &str) -> Option<&ZoneMatrix> {
        self.modes.iter().find(|(name, _)| name == mode).map(|(_, mm)| mm)
    }
}

pub struct ModeChoiceModel<'a> {
    scenario: &'a Scenario,
}

impl<'a> ModeChoiceModel<'a> {
    pub fn new(scenario: &'a Scenario) -> ModeChoiceModel<'a> {
        ModeChoiceModel{scenario}
    }

    pub fn probabilities_at(&self, distance_km: f64) -> Option<Vec<f64>> {
        let utilities: Vec<f64> = self.scenario.modes.iter()
            .map(|(_, util)| util.utility(distance_km))
            .collect();
        logit_probabilities(&utilities)
    }

    /// One probability matrix per mode.  `distances` is indexed like `zone_ids`.
    pub fn probability_matrices(&self, zone_ids: &[u32], distances: &Array<f64, Ix2>)
                                -> Result<Vec<Array<f64, Ix2>>> {
        let size = zone_ids.len();
        if distances.dim() != (size, size) {
            return Err(ModelError::Shape(format!("{} zones for a {:?} distance matrix", size,
                                                 distances.dim())));
        }
        let degenerate = |oi: usize, di: usize| ModelError::DegenerateScenario{
            scenario: self.scenario.name.clone(),
            origin: zone_ids[oi],
            destination: zone_ids[di],
        };
        if self.scenario.modes.is_empty() {
            let first = zone_ids.first().copied().unwrap_or(0);
            return Err(ModelError::DegenerateScenario{
                scenario: self.scenario.name.clone(),
                origin: first,
                destination: first,
            });
        }

        // each row holds, for every destination, the probability of each mode
        let rows: Vec<Vec<Vec<f64>>> = (0..size).into_par_iter().map(|oi| {
            (0..size).map(|di| {
                self.probabilities_at(distances[[oi, di]]).ok_or_else(|| degenerate(oi, di))
            }).collect::<Result<Vec<Vec<f64>>>>()
        }).collect::<Result<Vec<_>>>()?;

        let num_modes = self.scenario.modes.len();
        let mut matrices = vec![Array::zeros((size, size)); num_modes];
        for (oi, row) in rows.iter().enumerate() {
            for (di, probs) in row.iter().enumerate() {
                for (mi, prob) in probs.iter().enumerate() {
                    matrices[mi][[oi, di]] = *prob;
                }
            }
        }
        Ok(matrices)
    }

    /// Splits the trip matrix across the scenario's modes.
    pub fn split(&self, trips: &ZoneMatrix, distances: &Array<f64, Ix2>) -> Result<ModalTrips> {
        let probs = self.probability_matrices(trips.zone_ids(), distances)?;
        let mut modes = vec![];
        for ((name, _), prob) in self.scenario.modes.iter().zip(probs.iter()) {
            modes.push((name.clone(), trips.hadamard(prob)?));
        }
        Ok(ModalTrips{modes})
    }
}


#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use super::*;

    fn three_zone_distances() -> Array<f64, Ix2> {
        array![[0., 1., 2.], [1., 0., 1.], [2., 1., 0.]]
    }

    #[test]
    fn test_logit() {
        let probs = logit_probabilities(&[0., 0.]).unwrap();
        assert_relative_eq!(probs[0], 0.5);
        let probs = logit_probabilities(&[1., 0.]).unwrap();
        assert_relative_eq!(probs[0], 1f64.exp() / (1. + 1f64.exp()));
        // huge utilities don't overflow
        let probs = logit_probabilities(&[1000., 999.]).unwrap();
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.);
        assert!(probs[0] > probs[1]);

        assert!(logit_probabilities(&[]).is_none());
        assert!(logit_probabilities(&[0., f64::NAN]).is_none());
        assert!(logit_probabilities(&[0., f64::INFINITY]).is_none());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let dists = three_zone_distances();
        for scenario in Scenario::defaults() {
            let model = ModeChoiceModel::new(&scenario);
            let probs = model.probability_matrices(&[1, 2, 3], &dists).unwrap();
            assert_eq!(probs.len(), 3);
            let total = probs.iter().fold(Array::<f64, Ix2>::zeros((3, 3)), |acc, pp| acc + pp);
            for val in total.iter() {
                assert_relative_eq!(*val, 1., epsilon=1e-12);
            }
        }
    }

    #[test]
    fn test_zero_distance() {
        let scenario = &Scenario::defaults()[1];
        let probs = ModeChoiceModel::new(scenario).probabilities_at(0.).unwrap();
        let denom = 2. + 0.75f64.exp();
        assert_relative_eq!(probs[0], 1. / denom);
        assert_relative_eq!(probs[1], 0.75f64.exp() / denom);
        assert_relative_eq!(probs[2], 1. / denom);
    }

    #[test]
    fn test_longer_trips_favour_car() {
        let scenario = &Scenario::defaults()[0];
        let model = ModeChoiceModel::new(scenario);
        let near = model.probabilities_at(1.).unwrap();
        let far = model.probabilities_at(50.).unwrap();
        assert!(far[2] > near[2]);
        assert!(far[0] < near[0]);
    }

    #[test]
    fn test_split_conserves_trips() {
        let trips = ZoneMatrix::new(vec![1, 2, 3], array![
            [0., 10., 5.], [3., 0., 7.], [1., 2., 4.]]).unwrap();
        let scenario = &Scenario::defaults()[2];
        let modal = ModeChoiceModel::new(scenario).split(&trips, &three_zone_distances()).unwrap();
        assert_eq!(modal.modes.len(), 3);

        let mut reconstructed = Array::<f64, Ix2>::zeros((3, 3));
        for (_, mm) in &modal.modes {
            reconstructed = reconstructed + mm.values();
        }
        for (val, orig) in reconstructed.iter().zip(trips.values().iter()) {
            assert_relative_eq!(*val, *orig, epsilon=1e-12);
        }

        let split = modal.modal_split();
        assert_relative_eq!(split.iter().map(|(_, ss)| ss).sum::<f64>(), 1., epsilon=1e-12);
        assert_eq!(split[0].0, "walking");
        assert!(modal.get("bus").is_some());
        assert!(modal.get("tram").is_none());
    }

    #[test]
    fn test_single_mode() {
        let scenario = Scenario::new("car only",
                                     vec![(String::from("car"), ModeUtility::new(-0.01, 0.))]);
        let probs = ModeChoiceModel::new(&scenario)
            .probability_matrices(&[1, 2, 3], &three_zone_distances()).unwrap();
        assert!(probs[0].iter().all(|pp| *pp == 1.));
    }

    #[test]
    fn test_empty_trips_split() {
        let trips = ZoneMatrix::zeros(vec![1, 2, 3]).unwrap();
        let scenario = &Scenario::defaults()[0];
        let modal = ModeChoiceModel::new(scenario).split(&trips, &three_zone_distances()).unwrap();
        assert!(modal.modal_split().iter().all(|(_, ss)| *ss == 0.));
    }

    #[test]
    fn test_degenerate_scenario() {
        let scenario = Scenario::new("broken", vec![
            (String::from("walking"), ModeUtility::new(-0.05, 0.)),
            (String::from("teleport"), ModeUtility::new(0., f64::NAN)),
        ]);
        let result = ModeChoiceModel::new(&scenario)
            .probability_matrices(&[4, 5, 6], &three_zone_distances());
        match result {
            Err(ModelError::DegenerateScenario{scenario, origin, destination}) => {
                assert_eq!(scenario, "broken");
                assert!([4, 5, 6].contains(&origin));
                assert!([4, 5, 6].contains(&destination));
            }
            other => panic!("expected a degenerate scenario error, got {:?}", other),
        }

        let empty = Scenario::new("empty", vec![]);
        let result = ModeChoiceModel::new(&empty)
            .probability_matrices(&[4, 5, 6], &three_zone_distances());
        assert!(matches!(result, Err(ModelError::DegenerateScenario{..})));
    }
}
