// imports of other modules from this crate
mod error;
pub use error::{ModelError, Result};

mod geometry;
pub use geometry::{haversine_distances, LatLon, Point2d, Polygon};

mod matrix;
pub use matrix::{LongTable, OdTriple, ZoneMatrix};

mod zones;
pub use zones::{load_demand, load_zone_geometries, margins_match, GridCity, JoinPolicy, Zone,
                ZoneGeometry, ZoneTable, EMPLOYEE_COLUMN, HOME_COLUMN};

mod distribution;
pub use distribution::{CostModel, Distributor, IpfSettings, Margin};

mod mode_choice;
pub use mode_choice::{logit_probabilities, ModalTrips, ModeChoiceModel, ModeUtility, Scenario};

mod network;
pub use network::{EdgeLoad, ZoneLink, ZoneNetwork, ZoneNode};

mod my_dijkstra;

mod assignment;
pub use assignment::{Assigner, LoadedNetwork, NoPathPolicy};

mod config_utils;

mod config;
pub use config::{ModelConfig, ZoneSource};

mod report;
pub use report::{Report, Reporter};

mod model;
pub use model::{ModelRun, ScenarioResult, TransportModel};

#[cfg(test)]
mod test_utils;
