use std::path::{Path, PathBuf};

use yaml_rust::{Yaml, YamlLoader};

use super::assignment::NoPathPolicy;
use super::config_utils::{require_f64, require_str, require_usize, str_to_absolute_path,
                          yaml_f64};
use super::distribution::IpfSettings;
use super::error::{ModelError, Result};
use super::geometry::LatLon;
use super::mode_choice::{ModeUtility, Scenario};
use super::zones::{GridCity, JoinPolicy};


static DEFAULT_BETA: f64 = 0.01;
pub static DEFAULT_SEED: u64 = 100;

/// Where the zones come from.
#[derive(PartialEq, Debug, Clone)]
pub enum ZoneSource {
    Dataset {
        zones_path: PathBuf,
        home_path: PathBuf,
        employee_path: PathBuf,
    },
    GridCity {
        grid: GridCity,
        seed: u64,
    },
}

#[derive(PartialEq, Debug, Clone)]
pub struct ModelConfig {
    pub zone_source: ZoneSource,
    pub beta: f64,
    pub ipf: IpfSettings,
    pub join_policy: JoinPolicy,
    pub no_path_policy: NoPathPolicy,
    pub output_dir: Option<PathBuf>,
    pub scenarios: Vec<Scenario>,
}

impl ModelConfig {
    pub fn from_path(config_path: &Path) -> Result<ModelConfig> {
        let file_contents = std::fs::read_to_string(config_path)?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        ModelConfig::from_yaml_str(&file_contents, base_dir)
    }

    /// Parses a yaml config.  Relative paths are taken relative to `base_dir`.
    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> Result<ModelConfig> {
        let docs = YamlLoader::load_from_str(contents).map_err(|err|
            ModelError::Config(format!("failed to parse config as yaml: {}", err)))?;
        let yaml_cfg = docs.get(0).ok_or_else(||
            ModelError::Config(String::from("config is empty")))?;
        ModelConfig::from_yaml(yaml_cfg, base_dir)
    }

    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> Result<ModelConfig> {
        let zone_source = if !yaml_cfg["dataset"].is_badvalue() {
            let dataset_cfg = &yaml_cfg["dataset"];
            let path = |key: &str| -> Result<PathBuf> {
                Ok(str_to_absolute_path(require_str(dataset_cfg, key)?, base_dir))
            };
            ZoneSource::Dataset {
                zones_path: path("zones_path")?,
                home_path: path("home_path")?,
                employee_path: path("employee_path")?,
            }
        } else if !yaml_cfg["grid_city"].is_badvalue() {
            let grid_cfg = &yaml_cfg["grid_city"];
            let grid = GridCity {
                num_x_zones: require_usize(grid_cfg, "num_x_zones")?,
                num_y_zones: require_usize(grid_cfg, "num_y_zones")?,
                zone_size_deg: require_f64(grid_cfg, "zone_size_deg")?,
                origin: LatLon::new(yaml_f64(grid_cfg, "origin_lat").unwrap_or(0.),
                                    yaml_f64(grid_cfg, "origin_lon").unwrap_or(0.)),
                num_workers: require_f64(grid_cfg, "num_workers")?,
            };
            if grid.num_x_zones == 0 || grid.num_y_zones == 0 || !(grid.zone_size_deg > 0.) {
                return Err(ModelError::Config(String::from("grid_city must be non-empty")));
            }
            let seed = match &grid_cfg["seed"] {
                Yaml::BadValue => DEFAULT_SEED,
                _ => require_usize(grid_cfg, "seed")? as u64,
            };
            ZoneSource::GridCity{grid, seed}
        } else {
            return Err(ModelError::Config(String::from(
                "config must contain either `dataset` or `grid_city`")));
        };

        let beta = match &yaml_cfg["beta"] {
            Yaml::BadValue => DEFAULT_BETA,
            _ => require_f64(yaml_cfg, "beta")?,
        };

        let mut ipf = IpfSettings::default();
        let ipf_cfg = &yaml_cfg["ipf"];
        if !ipf_cfg.is_badvalue() {
            if let Some(tolerance) = yaml_f64(ipf_cfg, "tolerance") {
                ipf.tolerance = tolerance;
            }
            if !ipf_cfg["max_iterations"].is_badvalue() {
                ipf.max_iterations = require_usize(ipf_cfg, "max_iterations")?;
            }
        }

        let join_policy = match yaml_cfg["join_policy"].as_str() {
            None | Some("drop") => JoinPolicy::Drop,
            Some("strict") => JoinPolicy::Strict,
            Some(other) => return Err(ModelError::Config(
                format!("unknown join_policy `{}`", other))),
        };
        let no_path_policy = match yaml_cfg["no_path_policy"].as_str() {
            None | Some("reject") => NoPathPolicy::Reject,
            Some("strand") => NoPathPolicy::Strand,
            Some(other) => return Err(ModelError::Config(
                format!("unknown no_path_policy `{}`", other))),
        };

        let output_dir = yaml_cfg["output_dir"].as_str()
            .map(|dir| str_to_absolute_path(dir, base_dir));

        let scenarios = match yaml_cfg["scenarios"].as_vec() {
            Some(scenario_cfgs) => scenario_cfgs.iter().map(parse_scenario)
                .collect::<Result<Vec<Scenario>>>()?,
            None => Scenario::defaults(),
        };

        Ok(ModelConfig {
            zone_source,
            beta,
            ipf,
            join_policy,
            no_path_policy,
            output_dir,
            scenarios,
        })
    }
}

fn parse_scenario(scenario_cfg: &Yaml) -> Result<Scenario> {
    let name = require_str(scenario_cfg, "name")?;
    let modes_cfg = scenario_cfg["modes"].as_hash().ok_or_else(||
        ModelError::Config(format!("scenario `{}` has no modes", name)))?;
    let mut modes = vec![];
    for (mode_name, mode_cfg) in modes_cfg {
        let mode_name = mode_name.as_str().ok_or_else(||
            ModelError::Config(format!("scenario `{}` has a non-string mode name", name)))?;
        let slope = require_f64(mode_cfg, "slope")?;
        let intercept = yaml_f64(mode_cfg, "intercept").unwrap_or(0.);
        modes.push((String::from(mode_name), ModeUtility::new(slope, intercept)));
    }
    Ok(Scenario::new(name, modes))
}
