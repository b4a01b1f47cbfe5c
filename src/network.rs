// The zone adjacency network: a wrapper around a petgraph undirected graph with one node per
// zone and one edge per pair of touching zones.
use std::collections::HashMap;

use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use super::geometry::LatLon;
use super::zones::ZoneTable;


#[derive(PartialEq, Debug, Clone)]
pub struct ZoneNode {
    pub id: u32,
    pub name: String,
    pub centroid: LatLon,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ZoneLink {
    pub distance_km: f64,
    pub volume: f64,
}

/// One row of a loaded network, as handed to reporting.
#[derive(PartialEq, Debug, Clone)]
pub struct EdgeLoad {
    pub from_id: u32,
    pub from_name: String,
    pub to_id: u32,
    pub to_name: String,
    pub distance_km: f64,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct ZoneNetwork {
    graph: UnGraph<ZoneNode, ZoneLink>,
    node_idxs_by_id: HashMap<u32, NodeIndex>,
}

impl ZoneNetwork {
    /// Links every pair of zones whose boundaries touch.  Node indices follow zone table order.
    pub fn from_zones(zones: &ZoneTable) -> ZoneNetwork {
        let zone_list = zones.zones();
        let mut graph = UnGraph::new_undirected();
        let mut node_idxs_by_id = HashMap::new();
        for zone in zone_list {
            let idx = graph.add_node(ZoneNode {
                id: zone.id,
                name: zone.name.clone(),
                centroid: zone.centroid,
            });
            node_idxs_by_id.insert(zone.id, idx);
        }

        // the touch test is the expensive part, so run it in parallel
        let size = zone_list.len();
        let touching: Vec<(usize, usize)> = (0..size).into_par_iter().flat_map_iter(|ii| {
            ((ii + 1)..size)
                .filter(move |jj| zone_list[ii].boundary.touches(&zone_list[*jj].boundary))
                .map(move |jj| (ii, jj))
        }).collect();

        for (ii, jj) in touching {
            let distance_km = zone_list[ii].centroid.haversine_km(&zone_list[jj].centroid);
            log::debug!("linking {} and {} ({} km)", zone_list[ii].name, zone_list[jj].name,
                        distance_km);
            graph.add_edge(NodeIndex::new(ii), NodeIndex::new(jj),
                           ZoneLink{distance_km, volume: 0.});
        }

        let network = ZoneNetwork{graph, node_idxs_by_id};
        log::info!("zone network has {} nodes, {} edges, and {} connected components",
                   network.get_num_nodes(), network.get_num_edges(),
                   connected_components(&network.graph));
        for node in network.graph.node_weights() {
            let idx = network.node_idxs_by_id[&node.id];
            if network.graph.edges(idx).next().is_none() {
                log::warn!("zone {} ({}) touches no other zone", node.id, node.name);
            }
        }
        network
    }

    pub fn graph(&self) -> &UnGraph<ZoneNode, ZoneLink> {
        &self.graph
    }

    pub fn get_node_idx_by_id(&self, id: u32) -> Option<NodeIndex> {
        self.node_idxs_by_id.get(&id).copied()
    }

    pub fn get_num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get_num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// The edge between two zones, if they touch.
    pub fn find_edge(&self, zone1: u32, zone2: u32) -> Option<EdgeIndex> {
        let aa = self.get_node_idx_by_id(zone1)?;
        let bb = self.get_node_idx_by_id(zone2)?;
        self.graph.find_edge(aa, bb)
    }

    pub fn volume(&self, zone1: u32, zone2: u32) -> Option<f64> {
        let edge = self.find_edge(zone1, zone2)?;
        self.graph.edge_weight(edge).map(|link| link.volume)
    }

    pub fn add_volume(&mut self, edge: EdgeIndex, volume: f64) {
        if let Some(link) = self.graph.edge_weight_mut(edge) {
            link.volume += volume;
        }
    }

    /// A copy of the network with every edge volume set back to zero.
    pub fn fresh_copy(&self) -> ZoneNetwork {
        let mut copy = self.clone();
        for link in copy.graph.edge_weights_mut() {
            link.volume = 0.;
        }
        copy
    }

    pub fn total_volume(&self) -> f64 {
        self.graph.edge_weights().map(|link| link.volume).sum()
    }

    pub fn edge_loads(&self) -> Vec<EdgeLoad> {
        self.graph.edge_references().map(|edge| {
            let from = &self.graph[edge.source()];
            let to = &self.graph[edge.target()];
            EdgeLoad {
                from_id: from.id,
                from_name: from.name.clone(),
                to_id: to.id,
                to_name: to.name.clone(),
                distance_km: edge.weight().distance_km,
                volume: edge.weight().volume,
            }
        }).collect()
    }
}
