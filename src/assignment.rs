use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use rayon::prelude::*;

use super::error::{ModelError, Result};
use super::matrix::{OdTriple, ZoneMatrix};
use super::my_dijkstra::{dijkstra_with_paths, trace_path};
use super::network::ZoneNetwork;


/// What to do with trips between zones that aren't connected.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum NoPathPolicy {
    /// Fail the assignment.
    Reject,
    /// Leave the volume off the network and record it as stranded.
    Strand,
}

/// A network with volumes assigned, plus whatever couldn't be routed.
#[derive(Debug, Clone)]
pub struct LoadedNetwork {
    pub network: ZoneNetwork,
    pub stranded: Vec<OdTriple>,
}

impl LoadedNetwork {
    pub fn stranded_volume(&self) -> f64 {
        self.stranded.iter().map(|st| st.value).sum()
    }
}

/// Shortest-path trees from every zone, computed once and reused for every mode and scenario,
/// since link costs don't depend on load.
pub struct Assigner<'a> {
    network: &'a ZoneNetwork,
    edges_used: Vec<HashMap<NodeIndex, EdgeIndex>>,
}

impl<'a> Assigner<'a> {
    pub fn new(network: &'a ZoneNetwork) -> Assigner<'a> {
        let graph = network.graph();
        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        // run dijkstra in parallel
        let edges_used = nodes.par_iter().map(|nn| {
            let (_, edges) = dijkstra_with_paths(graph, *nn, |er| er.weight().distance_km);
            edges
        }).collect();
        Assigner{network, edges_used}
    }

    /// Edges on the shortest path between two zones, in travel order.  Empty if the zones are
    /// the same; `None` if either zone is unknown or they aren't connected.
    pub fn path(&self, origin: u32, destination: u32) -> Option<Vec<EdgeIndex>> {
        let start = self.network.get_node_idx_by_id(origin)?;
        let goal = self.network.get_node_idx_by_id(destination)?;
        trace_path(self.network.graph(), start, goal, &self.edges_used[start.index()])
    }

    /// Loads every positive cell of `trips` onto the shortest path between its zones.
    pub fn assign(&self, trips: &ZoneMatrix, policy: NoPathPolicy) -> Result<LoadedNetwork> {
        for id in trips.zone_ids() {
            if self.network.get_node_idx_by_id(*id).is_none() {
                return Err(ModelError::Shape(format!("trip zone {} is not in the network", id)));
            }
        }

        let mut loaded = self.network.fresh_copy();
        let mut stranded = vec![];
        let zone_ids = trips.zone_ids();
        for ((oi, di), volume) in trips.values().indexed_iter() {
            let (origin, destination, volume) = (zone_ids[oi], zone_ids[di], *volume);
            if !(volume > 0.) || origin == destination {
                continue;
            }
            match self.path(origin, destination) {
                Some(path) => {
                    for edge in path {
                        loaded.add_volume(edge, volume);
                    }
                }
                None => match policy {
                    NoPathPolicy::Reject => {
                        return Err(ModelError::NoPath{origin, destination});
                    }
                    NoPathPolicy::Strand => {
                        log::warn!("no path from zone {} to zone {}: {} trips stranded", origin,
                                   destination, volume);
                        stranded.push(OdTriple{origin, destination, value: volume});
                    }
                },
            }
        }
        Ok(LoadedNetwork{network: loaded, stranded})
    }
}
