//! Simulador de reproducción: recorre una traza JSON grabada tick por tick.
//!
//! Formato de la traza:
//!
//! ```json
//! {
//!   "edges": { "E0": { "length": 240.0, "traffic_light": { "id": "J1", "state": "GrGr" } } },
//!   "lanes": { "E0_0": 238.4 },
//!   "ticks": [
//!     { "sim_time": 1.0, "vehicles": [
//!         { "id": "ev_0", "position": [10.0, 4.0], "speed": 8.3, "waiting_time": 0.0,
//!           "battery": { "charge": 2900.0, "capacity": 3000.0 },
//!           "edge_id": "E0", "lane_id": "E0_0", "lane_position": 12.0,
//!           "route": ["E0", "E1"], "route_index": 0 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Un vehículo sin `battery` no es EV.


use std::collections::HashMap;
use std::fs;
use std::path::Path;
use serde::Deserialize;
use crate::message::domain::Position;
use crate::system::domain::ErrorType;
use super::domain::{TrafficLight, TrafficSimulator};


#[derive(Debug, Clone, Deserialize)]
struct EdgeInfo {
    length: f64,
    #[serde(default)]
    traffic_light: Option<TrafficLight>,
}


#[derive(Debug, Clone, Deserialize)]
struct BatterySnapshot {
    charge: f64,
    #[serde(default)]
    capacity: Option<f64>,
}


#[derive(Debug, Clone, Deserialize)]
struct VehicleSnapshot {
    id: String,
    position: Position,
    speed: f64,
    #[serde(default)]
    waiting_time: f64,
    #[serde(default)]
    battery: Option<BatterySnapshot>,
    #[serde(default)]
    edge_id: Option<String>,
    #[serde(default)]
    lane_id: Option<String>,
    #[serde(default)]
    lane_position: Option<f64>,
    #[serde(default)]
    route: Vec<String>,
    #[serde(default)]
    route_index: Option<usize>,
}


#[derive(Debug, Clone, Deserialize)]
struct TraceTick {
    sim_time: f64,
    #[serde(default)]
    vehicles: Vec<VehicleSnapshot>,
}


#[derive(Debug, Clone, Deserialize)]
struct TraceFile {
    #[serde(default)]
    edges: HashMap<String, EdgeInfo>,
    #[serde(default)]
    lanes: HashMap<String, f64>,
    ticks: Vec<TraceTick>,
}


#[derive(Debug, Clone)]
pub struct ReplaySimulator {
    trace: TraceFile,
    cursor: Option<usize>,
}


impl ReplaySimulator {
    pub fn from_json(raw: &str) -> Result<Self, ErrorType> {
        let trace: TraceFile = serde_json::from_str(raw)?;

        let ordered = trace.ticks
            .windows(2)
            .all(|pair| pair[0].sim_time <= pair[1].sim_time);
        if !ordered {
            return Err(ErrorType::Trace("sim_time debe ser no decreciente".to_string()));
        }

        Ok(Self { trace, cursor: None })
    }

    pub fn from_file(path: &Path) -> Result<Self, ErrorType> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn tick(&self) -> Option<&TraceTick> {
        self.cursor.and_then(|index| self.trace.ticks.get(index))
    }

    fn vehicle(&self, vehicle_id: &str) -> Option<&VehicleSnapshot> {
        self.tick()?.vehicles.iter().find(|v| v.id == vehicle_id)
    }
}


impl TrafficSimulator for ReplaySimulator {
    fn step(&mut self) -> bool {
        let next = self.cursor.map_or(0, |index| index + 1);
        if next < self.trace.ticks.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    fn sim_time(&self) -> f64 {
        self.tick().map_or(0.0, |tick| tick.sim_time)
    }

    fn vehicle_ids(&self) -> Vec<String> {
        self.tick()
            .map(|tick| tick.vehicles.iter().map(|v| v.id.clone()).collect())
            .unwrap_or_default()
    }

    fn position(&self, vehicle_id: &str) -> Option<Position> {
        self.vehicle(vehicle_id).map(|v| v.position)
    }

    fn speed(&self, vehicle_id: &str) -> Option<f64> {
        self.vehicle(vehicle_id).map(|v| v.speed)
    }

    fn waiting_time(&self, vehicle_id: &str) -> Option<f64> {
        self.vehicle(vehicle_id).map(|v| v.waiting_time)
    }

    fn battery_charge(&self, vehicle_id: &str) -> Option<f64> {
        self.vehicle(vehicle_id)?.battery.as_ref().map(|b| b.charge)
    }

    fn battery_capacity(&self, vehicle_id: &str) -> Option<f64> {
        self.vehicle(vehicle_id)?.battery.as_ref()?.capacity
    }

    fn has_battery_device(&self, vehicle_id: &str) -> bool {
        self.vehicle(vehicle_id).is_some_and(|v| v.battery.is_some())
    }

    fn road_id(&self, vehicle_id: &str) -> Option<String> {
        self.vehicle(vehicle_id)?.edge_id.clone()
    }

    fn lane_id(&self, vehicle_id: &str) -> Option<String> {
        self.vehicle(vehicle_id)?.lane_id.clone()
    }

    fn lane_position(&self, vehicle_id: &str) -> Option<f64> {
        self.vehicle(vehicle_id)?.lane_position
    }

    fn edge_vehicle_ids(&self, edge_id: &str) -> Option<Vec<String>> {
        let tick = self.tick()?;
        Some(tick.vehicles
            .iter()
            .filter(|v| v.edge_id.as_deref() == Some(edge_id))
            .map(|v| v.id.clone())
            .collect())
    }

    fn lane_length(&self, lane_id: &str) -> Option<f64> {
        if let Some(length) = self.trace.lanes.get(lane_id) {
            return Some(*length);
        }
        // "E0_1" -> "E0"
        let (edge_id, _) = lane_id.rsplit_once('_')?;
        self.edge_length(edge_id)
    }

    fn edge_length(&self, edge_id: &str) -> Option<f64> {
        self.trace.edges.get(edge_id).map(|e| e.length)
    }

    fn route(&self, vehicle_id: &str) -> Option<Vec<String>> {
        let route = &self.vehicle(vehicle_id)?.route;
        if route.is_empty() {
            None
        } else {
            Some(route.clone())
        }
    }

    fn route_index(&self, vehicle_id: &str) -> Option<usize> {
        self.vehicle(vehicle_id)?.route_index
    }

    fn traffic_light_at_end(&self, edge_id: &str) -> Option<TrafficLight> {
        self.trace.edges.get(edge_id)?.traffic_light.clone()
    }
}
