//! Estructuras de dominio para la lectura de las tablas persistidas.
//!
//! Cada estructura representa una fila exacta (o una fila agregada) de las
//! tablas `rsu_vehicle_logs`, `rsu_status` y `vehicle_logs`. Los nombres de
//! columna son los que usan las herramientas de análisis existentes.


use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use crate::message::domain::{Position, StationStat};


/// Fila del log crudo: un registro transmitido por una RSU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct RsuVehicleLogRow {
    pub id: i64,
    pub ts_utc: String,
    pub rsu_id: String,
    pub rsu_position_x: f64,
    pub rsu_position_y: f64,
    pub vehicle_id: String,
    pub vehicle_type: Option<String>,
    pub position_x: f64,
    pub position_y: f64,
    pub speed: f64,
    pub battery_charge: f64,
    pub battery_capacity: Option<f64>,
    pub battery_percentage: f64,
    pub sim_time: f64,
    pub collection_timestamp: Option<String>,
    pub edge_id: Option<String>,
    pub lane_id: Option<String>,
    pub lane_position: Option<f64>,
    pub vehicles_ahead_count: Option<i64>,
    pub same_direction_ahead: Option<i64>,
    pub distance_to_traffic_light: Option<f64>,
    pub next_traffic_light: Option<String>,
    pub traffic_light_state: Option<String>,
    pub edge_occupancy_percentage: Option<f64>,
    pub extra: Option<String>,
}


/// Fila del log de estado: un lote aceptado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct RsuStatusRow {
    pub id: i64,
    pub ts_utc: String,
    pub rsu_id: String,
    pub rsu_position_x: f64,
    pub rsu_position_y: f64,
    pub vehicle_count: i64,
    pub data_records: i64,
    pub sent_at: Option<String>,
}


/// Fila del log legado, sin atribución a RSU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct VehicleLogRow {
    pub id: i64,
    pub ts_utc: String,
    pub vehicle_id: String,
    pub speed: f64,
    pub battery_charge: f64,
    pub battery_capacity: Option<String>,
    pub sim_time: f64,
}


/// Agregado de `rsu_status` por RSU.
#[derive(Debug, Clone, FromRow)]
pub struct StationStatRow {
    pub rsu_id: String,
    pub rsu_position_x: f64,
    pub rsu_position_y: f64,
    pub total_entities_served: i64,
    pub total_records: i64,
    pub last_update: String,
}


impl From<StationStatRow> for StationStat {
    fn from(row: StationStatRow) -> Self {
        StationStat {
            station_id: row.rsu_id,
            position: Position(row.rsu_position_x, row.rsu_position_y),
            total_entities_served: row.total_entities_served,
            total_records: row.total_records,
            last_update: row.last_update,
        }
    }
}


/// Estadística de vehículos por RSU calculada sobre el log crudo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct StationSummaryRow {
    pub rsu_id: String,
    pub unique_vehicles: i64,
    pub total_records: i64,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub min_speed: Option<f64>,
    pub avg_battery: Option<f64>,
    pub min_battery: Option<f64>,
}


/// Trayectoria resumida de un vehículo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct VehicleTrajectoryRow {
    pub vehicle_id: String,
    pub rsus_visited: i64,
    pub data_points: i64,
    pub min_battery: Option<f64>,
    pub max_battery: Option<f64>,
    pub battery_consumed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub first_seen: Option<f64>,
    pub last_seen: Option<f64>,
    pub travel_time: Option<f64>,
}


/// Actividad por minuto de simulación.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct TimelineRow {
    pub minute: i64,
    pub records: i64,
    pub active_vehicles: i64,
    pub avg_speed: Option<f64>,
    pub avg_battery: Option<f64>,
}
