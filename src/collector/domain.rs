//! Interfaz con el simulador de tráfico externo y tipos del bucle de recolección.
//!
//! Cada consulta al simulador devuelve `Option`: `None` significa que la
//! consulta falló o que el dato no existe. Quien consume decide el valor por
//! defecto; nunca se propaga como error.


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::config::traffic::{NO_TLS_DISTANCE, NO_TLS_ID, UNKNOWN_TLS_STATE};
use crate::message::domain::Position;


/// Semáforo y su estado de señales (ej. `"GrGr"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrafficLight {
    pub id: String,
    pub state: String,
}


pub trait TrafficSimulator {
    /// Avanza un paso de simulación. `false` cuando ya no quedan pasos.
    fn step(&mut self) -> bool;

    fn sim_time(&self) -> f64;

    fn vehicle_ids(&self) -> Vec<String>;

    fn position(&self, vehicle_id: &str) -> Option<Position>;

    fn speed(&self, vehicle_id: &str) -> Option<f64>;

    /// Segundos que el vehículo lleva detenido.
    fn waiting_time(&self, vehicle_id: &str) -> Option<f64>;

    fn battery_charge(&self, vehicle_id: &str) -> Option<f64>;

    fn battery_capacity(&self, vehicle_id: &str) -> Option<f64>;

    /// `true` si el vehículo lleva un dispositivo de batería (EV).
    fn has_battery_device(&self, vehicle_id: &str) -> bool;

    fn road_id(&self, vehicle_id: &str) -> Option<String>;

    fn lane_id(&self, vehicle_id: &str) -> Option<String>;

    /// Posición longitudinal sobre el carril, en metros desde su inicio.
    fn lane_position(&self, vehicle_id: &str) -> Option<f64>;

    fn edge_vehicle_ids(&self, edge_id: &str) -> Option<Vec<String>>;

    fn lane_length(&self, lane_id: &str) -> Option<f64>;

    fn edge_length(&self, edge_id: &str) -> Option<f64>;

    fn route(&self, vehicle_id: &str) -> Option<Vec<String>>;

    /// Índice del tramo actual dentro de `route`.
    fn route_index(&self, vehicle_id: &str) -> Option<usize>;

    /// Semáforo que controla el final de `edge_id`, si existe.
    fn traffic_light_at_end(&self, edge_id: &str) -> Option<TrafficLight>;
}


/// Contexto de tráfico local de un vehículo en un tick.
///
/// Los campos numéricos ya traen su valor por defecto cuando la consulta falló.
/// La distancia al semáforo es de mejor esfuerzo.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrafficContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_position: Option<f64>,
    pub vehicles_ahead_count: i64,
    pub same_direction_ahead: i64,
    pub distance_to_traffic_light: f64,
    pub next_traffic_light: String,
    pub traffic_light_state: String,
    pub edge_occupancy_percentage: f64,
}


impl Default for TrafficContext {
    fn default() -> Self {
        Self {
            edge_id: None,
            lane_id: None,
            lane_position: None,
            vehicles_ahead_count: 0,
            same_direction_ahead: 0,
            distance_to_traffic_light: NO_TLS_DISTANCE,
            next_traffic_light: NO_TLS_ID.to_string(),
            traffic_light_state: UNKNOWN_TLS_STATE.to_string(),
            edge_occupancy_percentage: 0.0,
        }
    }
}


impl TrafficContext {
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}


/// Parámetros del bucle de recolección.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub batch_size: usize,
    pub log_interval_secs: f64,
    pub status_interval_steps: u64,
}


/// Resumen de una corrida completa.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub steps: u64,
    pub vehicles_seen: usize,
    pub data_points: usize,
    pub failed_flushes: usize,
}
