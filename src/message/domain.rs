//! Dominio de Mensajería y Modelos de Datos.
//!
//! Este módulo define las estructuras que viajan entre el bucle de recolección,
//! las RSUs y el servicio de ingesta (contrato JSON sobre HTTP).
//!


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};


/// Coordenada 2D en unidades de la simulación. Viaja como `[x, y]`.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position(pub f64, pub f64);


impl Position {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }

    /// Distancia euclídea entre dos puntos.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((other.0 - self.0).powi(2) + (other.1 - self.1).powi(2)).sqrt()
    }
}


/// Claves de contexto de tráfico con columna propia en `rsu_vehicle_logs`.
///
/// Cualquier otra clave del mapa de contexto se persiste en la columna `extra`.
pub mod context_keys {
    pub const EDGE_ID: &str = "edge_id";
    pub const LANE_ID: &str = "lane_id";
    pub const LANE_POSITION: &str = "lane_position";
    pub const VEHICLES_AHEAD: &str = "vehicles_ahead_count";
    pub const SAME_DIRECTION_AHEAD: &str = "same_direction_ahead";
    pub const DISTANCE_TO_TLS: &str = "distance_to_traffic_light";
    pub const NEXT_TLS: &str = "next_traffic_light";
    pub const TLS_STATE: &str = "traffic_light_state";
    pub const EDGE_OCCUPANCY: &str = "edge_occupancy_percentage";

    pub const ALL: [&str; 9] = [
        EDGE_ID, LANE_ID, LANE_POSITION, VEHICLES_AHEAD, SAME_DIRECTION_AHEAD,
        DISTANCE_TO_TLS, NEXT_TLS, TLS_STATE, EDGE_OCCUPANCY,
    ];

    /// Nombres de los campos fijos de `ReportRecord`. No pueden usarse como
    /// clave de contexto: el JSON del lote quedaría con claves duplicadas.
    pub const RESERVED: [&str; 11] = [
        "vehicle_id", "position", "speed", "battery_charge", "battery_capacity",
        "battery_percentage", "sim_time", "rsu_id", "rsu_position",
        "collection_timestamp", "vehicle_type",
    ];
}


/// Porcentaje de batería: `charge / capacity * 100` si la capacidad es positiva, si no `0`.
pub fn battery_percentage(charge: f64, capacity: Option<f64>) -> f64 {
    match capacity {
        Some(capacity) if capacity > 0.0 => charge / capacity * 100.0,
        _ => 0.0,
    }
}


/// Muestra de un vehículo en un tick, antes de ser asignada a una RSU.
///
/// El núcleo es obligatorio; el contexto de tráfico es un mapa abierto que
/// puede venir vacío o con claves nuevas.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleReport {
    pub vehicle_id: String,
    pub position: Position,
    pub speed: f64,
    pub battery_charge: f64,
    pub battery_capacity: Option<f64>,
    pub battery_percentage: f64,
    pub sim_time: f64,
    pub context: Map<String, Value>,
}


impl VehicleReport {
    pub fn new(vehicle_id: impl Into<String>,
               position: Position,
               speed: f64,
               battery_charge: f64,
               battery_capacity: Option<f64>,
               sim_time: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            position,
            speed,
            battery_charge,
            battery_capacity,
            battery_percentage: battery_percentage(battery_charge, battery_capacity),
            sim_time,
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }
}


/// Registro de telemetría tal como queda en el buffer de una RSU y viaja al servidor.
///
/// Inmutable una vez almacenado en el buffer. Los campos de procedencia
/// (`rsu_*`, `collection_timestamp`) se agregan al momento de almacenarlo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub vehicle_id: String,
    pub position: Position,
    pub speed: f64,
    pub battery_charge: f64,
    #[serde(default)]
    pub battery_capacity: Option<f64>,
    #[serde(default)]
    pub battery_percentage: f64,
    pub sim_time: f64,
    #[serde(default)]
    pub rsu_id: String,
    #[serde(default)]
    pub rsu_position: Option<Position>,
    #[serde(default)]
    pub collection_timestamp: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(flatten)]
    pub context: Map<String, Value>,
}


impl ReportRecord {
    pub fn context_str(&self, key: &str) -> Option<String> {
        match self.context.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn context_f64(&self, key: &str) -> Option<f64> {
        self.context.get(key).and_then(Value::as_f64)
    }

    pub fn context_i64(&self, key: &str) -> Option<i64> {
        let value = self.context.get(key)?;
        value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
    }

    /// Claves de contexto sin columna propia, serializadas como JSON. `None` si no hay.
    pub fn extra_context(&self) -> Option<String> {
        let extra: Map<String, Value> = self.context
            .iter()
            .filter(|(key, _)| !context_keys::ALL.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if extra.is_empty() {
            None
        } else {
            Some(Value::Object(extra).to_string())
        }
    }
}


/// Cuerpo de `POST /ingest_rsu`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchPayload {
    pub station_id: String,
    pub station_position: Position,
    pub records: Vec<ReportRecord>,
    pub sent_at: String,
}


/// Respuesta de `POST /ingest_rsu`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestAck {
    pub status: String,
    pub station_id: String,
    pub inserted: u64,
    pub timestamp: String,
}


/// Estadística agregada de una RSU (`GET /rsu_stats`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationStat {
    pub station_id: String,
    pub position: Position,
    /// Suma de vehículos distintos por lote. Un mismo vehículo en varios lotes cuenta varias veces.
    pub total_entities_served: i64,
    pub total_records: i64,
    pub last_update: String,
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationStatsResponse {
    pub stations: Vec<StationStat>,
}


/// Capacidad de batería del camino legado: los clientes antiguos la envían como texto.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CapacityValue {
    Number(f64),
    Text(String),
}


impl CapacityValue {
    pub fn as_text(&self) -> String {
        match self {
            CapacityValue::Number(n) => n.to_string(),
            CapacityValue::Text(s) => s.clone(),
        }
    }
}


/// Elemento del cuerpo de `POST /ingest` (camino legado, sin RSU).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacyVehicleLog {
    pub vehicle_id: String,
    pub speed: f64,
    pub battery_charge: f64,
    #[serde(default)]
    pub battery_capacity: Option<CapacityValue>,
    pub sim_time: f64,
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyAck {
    pub status: String,
    pub inserted: u64,
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearAck {
    pub status: String,
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percentage_is_zero_without_capacity() {
        assert_eq!(battery_percentage(80.0, Some(100.0)), 80.0);
        assert_eq!(battery_percentage(80.0, Some(0.0)), 0.0);
        assert_eq!(battery_percentage(80.0, None), 0.0);
    }

    #[test]
    fn position_travels_as_array() {
        let encoded = serde_json::to_value(Position(1.5, -2.0)).unwrap();
        assert_eq!(encoded, json!([1.5, -2.0]));
    }

    #[test]
    fn record_without_context_fields_still_parses() {
        let record: ReportRecord = serde_json::from_value(json!({
            "vehicle_id": "ev_1",
            "position": [10.0, 20.0],
            "speed": 3,
            "battery_charge": 50.0,
            "sim_time": 40.0
        })).unwrap();

        assert_eq!(record.speed, 3.0);
        assert!(record.battery_capacity.is_none());
        assert!(record.context.is_empty());
        assert!(record.context_str(context_keys::EDGE_ID).is_none());
        assert!(record.extra_context().is_none());
    }

    #[test]
    fn unknown_context_keys_are_kept_apart() {
        let record: ReportRecord = serde_json::from_value(json!({
            "vehicle_id": "ev_1",
            "position": [0.0, 0.0],
            "speed": 0.0,
            "battery_charge": 1.0,
            "sim_time": 0.0,
            "edge_id": "E0",
            "vehicles_ahead_count": 4,
            "time_to_red_light": 12.5
        })).unwrap();

        assert_eq!(record.context_str(context_keys::EDGE_ID).as_deref(), Some("E0"));
        assert_eq!(record.context_i64(context_keys::VEHICLES_AHEAD), Some(4));
        assert_eq!(record.extra_context().as_deref(), Some(r#"{"time_to_red_light":12.5}"#));
    }

    #[test]
    fn legacy_capacity_accepts_text_or_number() {
        let logs: Vec<LegacyVehicleLog> = serde_json::from_value(json!([
            {"vehicle_id": "a", "speed": 1.0, "battery_charge": 2.0, "battery_capacity": "3000", "sim_time": 0.0},
            {"vehicle_id": "b", "speed": 1.0, "battery_charge": 2.0, "battery_capacity": 3000.5, "sim_time": 0.0},
            {"vehicle_id": "c", "speed": 1.0, "battery_charge": 2.0, "sim_time": 0.0}
        ])).unwrap();

        assert_eq!(logs[0].battery_capacity.as_ref().map(CapacityValue::as_text).as_deref(), Some("3000"));
        assert_eq!(logs[1].battery_capacity.as_ref().map(CapacityValue::as_text).as_deref(), Some("3000.5"));
        assert!(logs[2].battery_capacity.is_none());
    }
}
