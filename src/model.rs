use std::path::Path;

use ndarray::prelude::*;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use super::assignment::{Assigner, LoadedNetwork};
use super::config::{ModelConfig, ZoneSource};
use super::distribution::{CostModel, Distributor, Margin};
use super::error::{ModelError, Result};
use super::matrix::ZoneMatrix;
use super::mode_choice::{ModalTrips, ModeChoiceModel, Scenario};
use super::network::ZoneNetwork;
use super::report::{slug, Report, Reporter};
use super::zones::{load_demand, load_zone_geometries, ZoneTable, EMPLOYEE_COLUMN, HOME_COLUMN};


/// Everything one scenario produces.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub modal_trips: ModalTrips,
    pub modal_split: Vec<(String, f64)>,
    pub loaded: Vec<(String, LoadedNetwork)>,
}

impl ScenarioResult {
    pub fn loaded_network(&self, mode: &str) -> Option<&LoadedNetwork> {
        self.loaded.iter().find(|(name, _)| name == mode).map(|(_, ln)| ln)
    }
}

/// The shared trip matrix plus the outcome of each scenario, in config order.  A scenario that
/// failed doesn't stop the others.
#[derive(Debug)]
pub struct ModelRun {
    pub trips: ZoneMatrix,
    pub scenarios: Vec<(String, Result<ScenarioResult>)>,
}

impl ModelRun {
    pub fn scenario(&self, name: &str) -> Option<&Result<ScenarioResult>> {
        self.scenarios.iter().find(|(sn, _)| sn == name).map(|(_, res)| res)
    }

    pub fn num_failed(&self) -> usize {
        self.scenarios.iter().filter(|(_, res)| res.is_err()).count()
    }
}

pub struct TransportModel {
    cfg: ModelConfig,
    zones: ZoneTable,
    network: ZoneNetwork,
    distances: Array<f64, Ix2>,
}

impl TransportModel {
    /// Reads the config and generates the balanced zone table it describes.
    pub fn from_cfg(config_path_str: &str) -> Result<TransportModel> {
        let cfg = ModelConfig::from_path(Path::new(config_path_str))?;
        let zones = generate_zones(&cfg)?;
        Ok(TransportModel::new(cfg, zones))
    }

    pub fn new(cfg: ModelConfig, zones: ZoneTable) -> TransportModel {
        let network = ZoneNetwork::from_zones(&zones);
        let distances = zones.distance_matrix();
        TransportModel{cfg, zones, network, distances}
    }

    pub fn config(&self) -> &ModelConfig {
        &self.cfg
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn network(&self) -> &ZoneNetwork {
        &self.network
    }

    /// Centroid distances in km, in zone table order.
    pub fn distances(&self) -> &Array<f64, Ix2> {
        &self.distances
    }

    /// Trip distribution: seeds a matrix with distance friction and balances it to the zones'
    /// production and attraction.
    pub fn distribute(&self) -> Result<ZoneMatrix> {
        let seed = CostModel::new(self.cfg.beta).cost_matrix(&self.zones)?.melt();
        let production = Margin::new(self.zones.zone_ids(), self.zones.production())?;
        let attraction = Margin::new(self.zones.zone_ids(), self.zones.attraction())?;
        Distributor::new(self.cfg.ipf).distribute(&seed, &production, &attraction)
    }

    /// Mode choice and assignment for one scenario.  `trips` must cover the zones in zone table
    /// order, as `distribute` returns them.
    pub fn run_scenario(&self, scenario: &Scenario, trips: &ZoneMatrix, assigner: &Assigner,
                        reporter: Option<&Reporter>) -> Result<ScenarioResult> {
        if trips.zone_ids() != self.zones.zone_ids().as_slice() {
            return Err(ModelError::Shape(format!(
                "trip matrix zones {:?} are not in zone table order", trips.zone_ids())));
        }
        let modal_trips = ModeChoiceModel::new(scenario).split(trips, &self.distances)?;
        let modal_split = modal_trips.modal_split();
        for (mode, share) in &modal_split {
            log::info!("{}: {} share {:.4}", scenario.name, mode, share);
        }
        if let Some(reporter) = reporter {
            reporter.submit(Report::ModalSplit {
                scenario: scenario.name.clone(),
                split: modal_split.clone(),
            });
            for (mode, mode_trips) in &modal_trips.modes {
                reporter.submit(Report::ModalTrips {
                    scenario: scenario.name.clone(),
                    mode: mode.clone(),
                    trips: mode_trips.clone(),
                });
            }
        }

        let mut loaded = vec![];
        for (mode, mode_trips) in &modal_trips.modes {
            let loaded_network = assigner.assign(mode_trips, self.cfg.no_path_policy)?;
            log::info!("{}: assigned {} {} trips, total link volume {:.1}", scenario.name,
                       mode_trips.total(), mode, loaded_network.network.total_volume());
            if let Some(reporter) = reporter {
                reporter.submit(Report::LoadedNetwork {
                    scenario: scenario.name.clone(),
                    mode: mode.clone(),
                    edges: loaded_network.network.edge_loads(),
                    stranded_volume: loaded_network.stranded_volume(),
                });
            }
            loaded.push((mode.clone(), loaded_network));
        }

        Ok(ScenarioResult {
            name: scenario.name.clone(),
            modal_trips,
            modal_split,
            loaded,
        })
    }

    /// Runs every configured scenario on one shared trip matrix.  Generation and distribution
    /// errors abort the run; scenario errors are logged and recorded.
    pub fn run(&self, reporter: Option<&Reporter>) -> Result<ModelRun> {
        log::info!("distributing trips between {} zones", self.zones.len());
        let trips = self.distribute()?;
        log::info!("distributed {:.1} trips", trips.total());

        if let Some(out_dir) = &self.cfg.output_dir {
            if let Err(err) = self.persist(out_dir, &trips) {
                log::error!("failed to write outputs to {}: {}", out_dir.display(), err);
            }
        }

        // link costs don't depend on load, so the paths are shared by every scenario
        let assigner = Assigner::new(&self.network);
        let mut scenarios = vec![];
        for scenario in &self.cfg.scenarios {
            log::info!("running scenario {} ({})", scenario.name, slug(&scenario.name));
            let result = self.run_scenario(scenario, &trips, &assigner, reporter);
            if let Err(err) = &result {
                log::error!("scenario {} failed: {}", scenario.name, err);
            }
            scenarios.push((scenario.name.clone(), result));
        }
        Ok(ModelRun{trips, scenarios})
    }

    fn persist(&self, out_dir: &Path, trips: &ZoneMatrix) -> Result<()> {
        std::fs::create_dir_all(out_dir)?;
        self.zones.write_snapshot(&out_dir.join("supply_and_demand_data.csv"))?;
        trips.write_csv(&out_dir.join("trips.csv"))
    }
}

fn generate_zones(cfg: &ModelConfig) -> Result<ZoneTable> {
    let (geometries, homes, employees) = match &cfg.zone_source {
        ZoneSource::Dataset{zones_path, home_path, employee_path} => {
            let geometries = load_zone_geometries(zones_path)?;
            let homes = load_demand(home_path, HOME_COLUMN)?;
            let employees = load_demand(employee_path, EMPLOYEE_COLUMN)?;
            (geometries, homes, employees)
        }
        ZoneSource::GridCity{grid, seed} => {
            let mut rng = Isaac64Rng::seed_from_u64(*seed);
            grid.generate(&mut rng)
        }
    };
    log::info!("loaded {} zone geometries", geometries.len());
    ZoneTable::generate(geometries, &homes, &employees, cfg.join_policy)
}


#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    use super::*;
    use super::super::assignment::NoPathPolicy;
    use super::super::config::DEFAULT_SEED;
    use super::super::distribution::IpfSettings;
    use super::super::geometry::LatLon;
    use super::super::mode_choice::ModeUtility;
    use super::super::test_utils::line_zones;
    use super::super::zones::{GridCity, JoinPolicy};

    fn car_only() -> Scenario {
        Scenario::new("car only", vec![(String::from("car"), ModeUtility::new(-0.01, 0.))])
    }

    fn config(scenarios: Vec<Scenario>) -> ModelConfig {
        ModelConfig {
            zone_source: ZoneSource::GridCity {
                grid: GridCity {
                    num_x_zones: 3,
                    num_y_zones: 1,
                    zone_size_deg: 0.01,
                    origin: LatLon::new(0., 0.),
                    num_workers: 20.,
                },
                seed: DEFAULT_SEED,
            },
            beta: 0.01,
            ipf: IpfSettings::default(),
            join_policy: JoinPolicy::Strict,
            no_path_policy: NoPathPolicy::Reject,
            output_dir: None,
            scenarios,
        }
    }

    // homes at both ends, jobs in the middle
    fn commuter_model(scenarios: Vec<Scenario>) -> TransportModel {
        TransportModel::new(config(scenarios), line_zones(&[10., 0., 10.], &[0., 20., 0.]))
    }

    #[test]
    fn test_distribute() {
        let model = commuter_model(vec![]);
        let trips = model.distribute().unwrap();
        assert_eq!(trips.zone_ids(), &[1, 2, 3]);
        assert_relative_eq!(trips.get(1, 2).unwrap(), 10., epsilon=1e-9);
        assert_relative_eq!(trips.get(3, 2).unwrap(), 10., epsilon=1e-9);
        assert_relative_eq!(trips.total(), 20., epsilon=1e-9);
    }

    #[test]
    fn test_end_to_end() {
        let model = commuter_model(vec![car_only()]);
        let run = model.run(None).unwrap();
        assert_eq!(run.num_failed(), 0);
        let result = run.scenario("car only").unwrap().as_ref().unwrap();
        assert_eq!(result.modal_split, vec![(String::from("car"), 1.)]);
        let loaded = result.loaded_network("car").unwrap();
        assert_relative_eq!(loaded.network.volume(1, 2).unwrap(), 10., epsilon=1e-9);
        assert_relative_eq!(loaded.network.volume(2, 3).unwrap(), 10., epsilon=1e-9);
        assert!(loaded.stranded.is_empty());
    }

    #[test]
    fn test_modal_trips_sum_to_trips() {
        let model = commuter_model(Scenario::defaults());
        let run = model.run(None).unwrap();
        assert_eq!(run.scenarios.len(), 3);
        for (_, result) in &run.scenarios {
            let result = result.as_ref().unwrap();
            let total: f64 = result.modal_trips.modes.iter().map(|(_, mm)| mm.total()).sum();
            assert_relative_eq!(total, run.trips.total(), epsilon=1e-9);
            let shares: f64 = result.modal_split.iter().map(|(_, ss)| ss).sum();
            assert_relative_eq!(shares, 1., epsilon=1e-9);
        }
        // a bus bonus moves trips onto the bus
        let bus_share = |name: &str| {
            let result = run.scenario(name).unwrap().as_ref().unwrap();
            result.modal_split.iter().find(|(mode, _)| mode == "bus").unwrap().1
        };
        assert!(bus_share("Scenario 2") > bus_share("Scenario 1"));
    }

    #[test]
    fn test_failed_scenario_does_not_stop_run() {
        let empty = Scenario::new("empty", vec![]);
        let model = commuter_model(vec![empty, car_only()]);
        let run = model.run(None).unwrap();
        assert_eq!(run.num_failed(), 1);
        assert!(matches!(run.scenario("empty"),
                         Some(Err(ModelError::DegenerateScenario{..}))));
        assert!(run.scenario("car only").unwrap().is_ok());
    }

    #[test]
    fn test_outputs_and_reports() {
        let dir = tempdir().unwrap();
        let mut cfg = config(vec![car_only()]);
        cfg.output_dir = Some(dir.path().join("out"));
        let model = TransportModel::new(cfg, line_zones(&[10., 0., 10.], &[0., 20., 0.]));
        let reporter = Reporter::spawn(&dir.path().join("reports")).unwrap();
        model.run(Some(&reporter)).unwrap();
        // split, one modal trip matrix, one loaded network
        assert_eq!(reporter.finish(), 3);
        assert!(dir.path().join("out/supply_and_demand_data.csv").exists());
        assert!(dir.path().join("out/trips.csv").exists());
        assert!(dir.path().join("reports/loads_car_only_car.csv").exists());
    }

    #[test]
    fn test_trips_out_of_zone_order() {
        let model = commuter_model(vec![car_only()]);
        let assigner = Assigner::new(model.network());
        let mut values = Array::zeros((3, 3));
        // 10 trips from zone 2 to zone 3, with rows and columns labelled 2, 1, 3
        values[[0, 2]] = 10.;
        let trips = ZoneMatrix::new(vec![2, 1, 3], values).unwrap();
        assert!(matches!(model.run_scenario(&car_only(), &trips, &assigner, None),
                         Err(ModelError::Shape(_))));

        let mut trips = ZoneMatrix::zeros(vec![1, 2, 3]).unwrap();
        trips.values_mut()[[1, 2]] = 10.;
        let result = model.run_scenario(&car_only(), &trips, &assigner, None).unwrap();
        let loaded = result.loaded_network("car").unwrap();
        assert_relative_eq!(loaded.network.volume(2, 3).unwrap(), 10.);
    }

    #[test]
    fn test_unwritable_output_dir() {
        let dir = tempdir().unwrap();
        // a file where the output directory should be
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut cfg = config(vec![car_only()]);
        cfg.output_dir = Some(blocker);
        let model = TransportModel::new(cfg, line_zones(&[10., 0., 10.], &[0., 20., 0.]));
        let run = model.run(None).unwrap();
        assert_eq!(run.num_failed(), 0);
        assert_relative_eq!(run.trips.total(), 20., epsilon=1e-9);
    }

    #[test]
    fn test_grid_city_generation() {
        let cfg = config(vec![car_only()]);
        let zones = generate_zones(&cfg).unwrap();
        assert_eq!(zones.len(), 3);
        assert_relative_eq!(zones.production().sum(), zones.attraction().sum(), epsilon=1e-9);
        // the same seed gives the same city
        assert_eq!(generate_zones(&cfg).unwrap(), zones);
    }
}
