//! Infrastructure graph and flood-aware evacuation routing.
//!
//! The second half of the digital twin: eight zone nodes and two shelters
//! joined by directed roads, bridges and highways. Water rises on every node
//! with rainfall (low ground first) and leaks along open edges. Edges close
//! when their endpoints flood, bridges first, and stay closed until
//! [`InfrastructureGraph::reset`].
//!
//! Routing runs Dijkstra over open edges whose target is still dry, with the
//! target's water level added to the travel time as a flood penalty.

use serde::{Deserialize, Serialize};

use crate::config::RAINFALL_CAP_MM;
use crate::crisis_params::GraphParams;
use crate::zones::{is_shelter, CITY_ZONES, SHELTER_IDS};

/// Costs are summed as integer hundredths of a minute for the search.
const COST_SCALE: f64 = 100.0;
/// Ground elevation (m) at which rain no longer raises a node.
const ELEVATION_CEILING: f64 = 60.0;
const RAIN_RISE_RATE: f64 = 0.05;
const EDGE_LEAK_RATE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Road,
    Bridge,
    Highway,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub water_level: f64,
    pub population: u32,
    pub is_flooded: bool,
    /// Metres above the river.
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Travel time in minutes.
    pub weight: f64,
    /// Vehicles per hour.
    pub capacity: u32,
    pub edge_type: EdgeType,
    pub blocked: bool,
    /// Share of upstream water that leaks along the edge, in [0, 1].
    pub permeability: f64,
}

/// Narrowest edge on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub from: String,
    pub to: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<String>,
    /// Minutes including flood penalties.
    pub total_cost: f64,
    pub bottleneck: Option<Bottleneck>,
}

impl Route {
    pub fn destination(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvacuationRoute {
    pub zone: String,
    /// `None` when no shelter is reachable.
    pub route: Option<Route>,
}

/// What changed during one flood step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStepReport {
    pub newly_flooded: Vec<String>,
    pub newly_blocked: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    params: GraphParams,
}

impl Default for InfrastructureGraph {
    fn default() -> Self {
        Self::new(GraphParams::default())
    }
}

type EdgeRow = (&'static str, &'static str, f64, u32, EdgeType, f64);

const CITY_EDGES: [EdgeRow; 17] = [
    ("zone-1", "zone-2", 8.0, 600, EdgeType::Road, 0.6),
    ("zone-2", "zone-1", 8.0, 600, EdgeType::Road, 0.6),
    ("zone-1", "zone-4", 6.0, 400, EdgeType::Bridge, 0.8),
    ("zone-1", "zone-6", 10.0, 500, EdgeType::Road, 0.5),
    ("zone-6", "zone-1", 10.0, 500, EdgeType::Road, 0.5),
    ("zone-2", "zone-3", 7.0, 500, EdgeType::Road, 0.6),
    ("zone-3", "zone-2", 7.0, 500, EdgeType::Road, 0.6),
    ("zone-2", "zone-6", 7.0, 900, EdgeType::Highway, 0.4),
    ("zone-2", "zone-8", 10.0, 350, EdgeType::Bridge, 0.7),
    ("zone-3", "zone-8", 9.0, 450, EdgeType::Road, 0.5),
    ("zone-3", "zone-7", 12.0, 300, EdgeType::Bridge, 0.7),
    ("zone-4", "zone-5", 7.0, 500, EdgeType::Road, 0.3),
    ("zone-4", "shelter-A", 9.0, 500, EdgeType::Road, 0.3),
    ("zone-5", "shelter-A", 5.0, 1200, EdgeType::Highway, 0.2),
    ("zone-6", "zone-7", 6.0, 550, EdgeType::Road, 0.4),
    ("zone-7", "shelter-B", 8.0, 1100, EdgeType::Highway, 0.2),
    ("zone-8", "shelter-B", 6.0, 600, EdgeType::Road, 0.2),
];

const SHELTER_ELEVATIONS: [f64; 2] = [48.0, 52.0];

impl InfrastructureGraph {
    /// The fixed city topology.
    pub fn new(params: GraphParams) -> Self {
        let mut nodes: Vec<GraphNode> = CITY_ZONES
            .iter()
            .map(|z| GraphNode {
                id: z.id.to_string(),
                name: z.name.to_string(),
                water_level: 0.0,
                population: z.population,
                is_flooded: false,
                elevation: z.elevation,
            })
            .collect();
        for (id, elevation) in SHELTER_IDS.iter().zip(SHELTER_ELEVATIONS) {
            nodes.push(GraphNode {
                id: id.to_string(),
                name: format!("Shelter {}", id.trim_start_matches("shelter-")),
                water_level: 0.0,
                population: 0,
                is_flooded: false,
                elevation,
            });
        }
        let edges = CITY_EDGES
            .iter()
            .map(|&(from, to, weight, capacity, edge_type, permeability)| GraphEdge {
                from: from.to_string(),
                to: to.to_string(),
                weight,
                capacity,
                edge_type,
                blocked: false,
                permeability,
            })
            .collect();
        Self {
            nodes,
            edges,
            params,
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn blocked_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.blocked).count()
    }

    pub fn flooded_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.is_flooded)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Close every edge that starts or ends at `id`.
    pub fn block_edges_touching(&mut self, id: &str) -> usize {
        let mut count = 0;
        for edge in self.edges.iter_mut() {
            if (edge.from == id || edge.to == id) && !edge.blocked {
                edge.blocked = true;
                count += 1;
            }
        }
        count
    }

    /// Raise water with `rainfall` (mm), leak along open edges and close
    /// edges whose endpoints are too wet.
    pub fn simulate_flood_step(&mut self, rainfall: f64) -> GraphStepReport {
        self.simulate_flood_step_with(rainfall, RAINFALL_CAP_MM)
    }

    /// As [`Self::simulate_flood_step`], saturating at `rainfall_cap_mm`.
    pub fn simulate_flood_step_with(
        &mut self,
        rainfall: f64,
        rainfall_cap_mm: f64,
    ) -> GraphStepReport {
        let rainfall_factor = (rainfall / rainfall_cap_mm).clamp(0.0, 1.0);
        for node in self.nodes.iter_mut() {
            let exposure = (1.0 - node.elevation / ELEVATION_CEILING).max(0.0);
            node.water_level += rainfall_factor * exposure * RAIN_RISE_RATE;
        }

        let levels: Vec<f64> = self.nodes.iter().map(|n| n.water_level).collect();
        let mut inflow = vec![0.0_f64; levels.len()];
        for edge in self.edges.iter().filter(|e| !e.blocked) {
            if let (Some(src), Some(dst)) = (self.node_index(&edge.from), self.node_index(&edge.to))
            {
                inflow[dst] += levels[src] * edge.permeability * EDGE_LEAK_RATE;
            }
        }

        let mut report = GraphStepReport::default();
        let threshold = self.params.node_flood_threshold;
        for (node, extra) in self.nodes.iter_mut().zip(inflow) {
            node.water_level = (node.water_level + extra).clamp(0.0, 1.0);
            if !node.is_flooded && node.water_level > threshold {
                node.is_flooded = true;
                report.newly_flooded.push(node.id.clone());
            }
        }

        let levels: Vec<(String, f64)> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.water_level))
            .collect();
        let level_of = |id: &str| {
            levels
                .iter()
                .find(|(n, _)| n == id)
                .map_or(0.0, |(_, l)| *l)
        };
        for edge in self.edges.iter_mut().filter(|e| !e.blocked) {
            let worst = level_of(&edge.from).max(level_of(&edge.to));
            let bridge_fails =
                edge.edge_type == EdgeType::Bridge && worst > self.params.bridge_failure_level;
            if bridge_fails || worst > self.params.edge_failure_level {
                edge.blocked = true;
                report
                    .newly_blocked
                    .push((edge.from.clone(), edge.to.clone()));
            }
        }
        report
    }

    /// Open outgoing edges of `idx` towards dry nodes, with fixed-point costs.
    fn successors(&self, idx: usize) -> Vec<(usize, u64)> {
        let id = &self.nodes[idx].id;
        self.edges
            .iter()
            .filter(|e| !e.blocked && &e.from == id)
            .filter_map(|e| {
                let to = self.node_index(&e.to)?;
                let target = &self.nodes[to];
                if target.is_flooded {
                    return None;
                }
                let cost = e.weight + target.water_level * self.params.flood_penalty;
                Some((to, (cost * COST_SCALE).round() as u64))
            })
            .collect()
    }

    fn route_from_indices(&self, path: Vec<usize>) -> Route {
        let ids: Vec<String> = path.iter().map(|&i| self.nodes[i].id.clone()).collect();
        let mut total_cost = 0.0;
        let mut bottleneck: Option<Bottleneck> = None;
        for pair in ids.windows(2) {
            let edge = self
                .edges
                .iter()
                .filter(|e| !e.blocked && e.from == pair[0] && e.to == pair[1])
                .min_by(|a, b| a.weight.total_cmp(&b.weight));
            if let Some(edge) = edge {
                let water = self.node(&edge.to).map_or(0.0, |n| n.water_level);
                total_cost += edge.weight + water * self.params.flood_penalty;
                if bottleneck.as_ref().is_none_or(|b| edge.capacity < b.capacity) {
                    bottleneck = Some(Bottleneck {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        capacity: edge.capacity,
                    });
                }
            }
        }
        Route {
            path: ids,
            total_cost,
            bottleneck,
        }
    }

    /// Cheapest open route from `start` to `end`, or `None`.
    pub fn dijkstra(&self, start: &str, end: &str) -> Option<Route> {
        let start_idx = self.node_index(start)?;
        let end_idx = self.node_index(end)?;
        let (path, _) = pathfinding::prelude::dijkstra(
            &start_idx,
            |&idx| self.successors(idx),
            |&idx| idx == end_idx,
        )?;
        Some(self.route_from_indices(path))
    }

    /// Cheapest open route from `start` to whichever shelter is closest.
    pub fn nearest_shelter(&self, start: &str) -> Option<Route> {
        let start_idx = self.node_index(start)?;
        let (path, _) = pathfinding::prelude::dijkstra(
            &start_idx,
            |&idx| self.successors(idx),
            |&idx| is_shelter(&self.nodes[idx].id),
        )?;
        Some(self.route_from_indices(path))
    }

    pub fn find_evacuation_routes(&self, zone_ids: &[String]) -> Vec<EvacuationRoute> {
        zone_ids
            .iter()
            .map(|zone| EvacuationRoute {
                zone: zone.clone(),
                route: self.nearest_shelter(zone),
            })
            .collect()
    }

    /// Dry every node and reopen every edge.
    pub fn reset(&mut self) {
        *self = Self::new(self.params.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology() {
        let graph = InfrastructureGraph::default();
        assert_eq!(graph.nodes().len(), 10);
        assert!(graph.node("shelter-A").is_some());
        assert!(graph.node("shelter-B").is_some());
        for edge in graph.edges() {
            assert!(graph.node(&edge.from).is_some(), "{}", edge.from);
            assert!(graph.node(&edge.to).is_some(), "{}", edge.to);
            assert!((0.0..=1.0).contains(&edge.permeability));
        }
    }

    #[test]
    fn test_dijkstra_zone1_to_shelter_a() {
        let graph = InfrastructureGraph::default();
        let route = graph.dijkstra("zone-1", "shelter-A").expect("route exists");
        assert_eq!(route.path.first().map(String::as_str), Some("zone-1"));
        assert_eq!(route.destination(), Some("shelter-A"));
        assert!(route.total_cost > 0.0);
        // zone-1 -> zone-4 -> shelter-A: 6 + 9
        assert_eq!(route.path, vec!["zone-1", "zone-4", "shelter-A"]);
        assert!((route.total_cost - 15.0).abs() < 1e-9);
        assert_eq!(route.bottleneck.map(|b| b.capacity), Some(400));
    }

    #[test]
    fn test_isolated_zone_has_no_route() {
        let mut graph = InfrastructureGraph::default();
        graph.block_edges_touching("zone-1");
        assert!(graph.dijkstra("zone-1", "shelter-A").is_none());
        assert!(graph.dijkstra("zone-1", "shelter-B").is_none());
        let routes = graph.find_evacuation_routes(&["zone-1".to_string(), "zone-2".to_string()]);
        assert!(routes[0].route.is_none());
        assert!(routes[1].route.is_some());
    }

    #[test]
    fn test_unknown_nodes_have_no_route() {
        let graph = InfrastructureGraph::default();
        assert!(graph.dijkstra("zone-404", "shelter-A").is_none());
        assert!(graph.dijkstra("zone-1", "nowhere").is_none());
    }

    #[test]
    fn test_flood_penalty_reroutes() {
        let mut graph = InfrastructureGraph::default();
        let dry = graph.nearest_shelter("zone-2").expect("route");
        // Drown zone-6 on the way to shelter-B without flooding it.
        if let Some(idx) = graph.node_index("zone-6") {
            graph.nodes[idx].water_level = 0.39;
        }
        let wet = graph.nearest_shelter("zone-2").expect("route");
        assert!(wet.total_cost >= dry.total_cost);
    }

    #[test]
    fn test_flooded_target_is_skipped() {
        let mut graph = InfrastructureGraph::default();
        if let Some(idx) = graph.node_index("zone-8") {
            graph.nodes[idx].is_flooded = true;
        }
        let route = graph.dijkstra("zone-1", "shelter-B").expect("detour exists");
        assert!(!route.path.iter().any(|n| n == "zone-8"));
        assert_eq!(route.path, vec!["zone-1", "zone-6", "zone-7", "shelter-B"]);

        if let Some(idx) = graph.node_index("zone-4") {
            graph.nodes[idx].is_flooded = true;
        }
        assert!(graph.dijkstra("zone-1", "shelter-A").is_none());
    }

    #[test]
    fn test_bridges_fail_before_roads_and_stay_blocked() {
        let mut graph = InfrastructureGraph::default();
        let mut first_bridge = None;
        let mut first_road = None;
        for step in 0..200 {
            let report = graph.simulate_flood_step(150.0);
            for (from, to) in &report.newly_blocked {
                let edge = graph
                    .edges()
                    .iter()
                    .find(|e| &e.from == from && &e.to == to)
                    .expect("edge exists");
                match edge.edge_type {
                    EdgeType::Bridge => {
                        first_bridge.get_or_insert(step);
                    }
                    _ => {
                        first_road.get_or_insert(step);
                    }
                }
            }
        }
        let bridge = first_bridge.expect("a bridge should fail");
        if let Some(road) = first_road {
            assert!(bridge <= road);
        }
        let blocked = graph.blocked_edge_count();
        graph.simulate_flood_step(0.0);
        assert!(graph.blocked_edge_count() >= blocked, "edge reopened");
    }

    #[test]
    fn test_water_rises_faster_on_low_ground() {
        let mut graph = InfrastructureGraph::default();
        graph.simulate_flood_step(150.0);
        let low = graph.node("zone-3").map(|n| n.water_level).unwrap_or(0.0);
        let high = graph.node("shelter-B").map(|n| n.water_level).unwrap_or(1.0);
        assert!(low > high);
    }

    #[test]
    fn test_reset_reopens_edges() {
        let mut graph = InfrastructureGraph::default();
        graph.block_edges_touching("zone-2");
        for _ in 0..50 {
            graph.simulate_flood_step(150.0);
        }
        graph.reset();
        assert_eq!(graph.blocked_edge_count(), 0);
        assert!(graph.flooded_nodes().is_empty());
    }

    #[test]
    fn test_rainfall_cap_saturates_node_rise() {
        let levels = |g: &InfrastructureGraph| -> Vec<f64> {
            g.nodes().iter().map(|n| n.water_level).collect()
        };
        let mut capped = InfrastructureGraph::default();
        capped.simulate_flood_step_with(75.0, 75.0);
        let mut saturated = InfrastructureGraph::default();
        saturated.simulate_flood_step(150.0);
        let mut half = InfrastructureGraph::default();
        half.simulate_flood_step(75.0);

        assert_eq!(levels(&capped), levels(&saturated));
        let total = |g: &InfrastructureGraph| levels(g).iter().sum::<f64>();
        assert!(total(&capped) > total(&half));
    }
}
