//! Unidad de borde (RSU): cobertura, buffer de registros y transmisión por lotes.
//!
//! Una `Station` se crea una sola vez al armar la red. Su identidad, posición y
//! radio son inmutables; el buffer y el conjunto de vehículos conectados cambian
//! durante la corrida.


use std::collections::{HashSet, VecDeque};
use serde::Serialize;
use tracing::{error, info, warn};
use crate::config::traffic::VEHICLE_TYPE_EV;
use crate::message::domain::{context_keys, BatchPayload, Position, ReportRecord, VehicleReport};
use crate::system::domain::utc_now_iso;
use crate::uplink::domain::Uplink;


/// Foto de solo lectura del estado de una RSU.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StationStatus {
    pub id: String,
    pub position: Position,
    pub coverage_radius: f64,
    pub connected_count: usize,
    pub buffered_count: usize,
}


#[derive(Debug, Clone)]
pub struct Station {
    id: String,
    position: Position,
    coverage_radius: f64,
    buffer: VecDeque<ReportRecord>,
    connected: HashSet<String>,
}


impl Station {
    pub fn new(id: impl Into<String>, position: Position, coverage_radius: f64) -> Self {
        Self {
            id: id.into(),
            position,
            coverage_radius,
            buffer: VecDeque::new(),
            connected: HashSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coverage_radius(&self) -> f64 {
        self.coverage_radius
    }

    pub fn buffered(&self) -> &VecDeque<ReportRecord> {
        &self.buffer
    }

    pub fn is_connected(&self, vehicle_id: &str) -> bool {
        self.connected.contains(vehicle_id)
    }

    pub fn distance_to(&self, position: &Position) -> f64 {
        self.position.distance_to(position)
    }

    /// `true` si `position` está dentro del radio de cobertura (borde incluido).
    pub fn is_in_range(&self, position: &Position) -> bool {
        self.distance_to(position) <= self.coverage_radius
    }

    /// Agrega el reporte al final del buffer con los campos de procedencia de esta RSU.
    ///
    /// No filtra: quien llama ya decidió que el vehículo es elegible.
    /// Las claves de contexto que pisan un campo fijo del registro se descartan.
    pub fn buffer_report(&mut self, report: VehicleReport) {
        let mut context = report.context;
        context.retain(|key, _| {
            let reserved = context_keys::RESERVED.contains(&key.as_str());
            if reserved {
                warn!(station = %self.id, vehicle = %report.vehicle_id, key = %key,
                      "Warning: clave de contexto reservada descartada");
            }
            !reserved
        });

        let record = ReportRecord {
            vehicle_id: report.vehicle_id,
            position: report.position,
            speed: report.speed,
            battery_charge: report.battery_charge,
            battery_capacity: report.battery_capacity,
            battery_percentage: report.battery_percentage,
            sim_time: report.sim_time,
            rsu_id: self.id.clone(),
            rsu_position: Some(self.position),
            collection_timestamp: Some(utc_now_iso()),
            vehicle_type: Some(VEHICLE_TYPE_EV.to_string()),
            context,
        };

        self.connected.insert(record.vehicle_id.clone());
        self.buffer.push_back(record);
    }

    /// Envía hasta `max_batch_size` registros (los más antiguos primero).
    ///
    /// * Buffer vacío: éxito inmediato sin tráfico de red.
    /// * Éxito: se quitan del frente exactamente los registros enviados.
    /// * Fallo: el buffer queda intacto para el próximo intento.
    ///
    /// Un `max_batch_size` de 0 se trata como 1.
    pub async fn transmit<U: Uplink>(&mut self, uplink: &U, max_batch_size: usize) -> bool {
        if self.buffer.is_empty() {
            return true;
        }

        let take = max_batch_size.max(1).min(self.buffer.len());
        let payload = BatchPayload {
            station_id: self.id.clone(),
            station_position: self.position,
            records: self.buffer.iter().take(take).cloned().collect(),
            sent_at: utc_now_iso(),
        };

        match uplink.send_batch(&payload).await {
            Ok(_) => {
                self.buffer.drain(..take);
                info!(station = %self.id, sent = take, pending = self.buffer.len(),
                      "Info: lote enviado al servidor");
                true
            }
            Err(e) => {
                error!(station = %self.id, pending = self.buffer.len(),
                       "Error: no se pudo enviar el lote al servidor. {e}");
                false
            }
        }
    }

    pub fn status(&self) -> StationStatus {
        StationStatus {
            id: self.id.clone(),
            position: self.position,
            coverage_radius: self.coverage_radius,
            connected_count: self.connected.len(),
            buffered_count: self.buffer.len(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::uplink::domain::mock::RecordingUplink;

    fn report(id: &str) -> VehicleReport {
        VehicleReport::new(id, Position(1.0, 1.0), 5.0, 40.0, Some(50.0), 10.0)
    }

    fn buffered_ids(station: &Station) -> Vec<String> {
        station.buffered().iter().map(|r| r.vehicle_id.clone()).collect()
    }

    #[test]
    fn range_boundary_is_inclusive() {
        let station = Station::new("S1", Position(10.0, 10.0), 5.0);
        assert!(station.is_in_range(&Position(13.0, 14.0)));
        assert!(station.is_in_range(&Position(10.0, 10.0)));
        assert!(!station.is_in_range(&Position(13.0, 14.001)));
        assert!(!station.is_in_range(&Position(-10.0, 10.0)));
    }

    #[test]
    fn buffering_attaches_provenance() {
        let mut station = Station::new("S1", Position(3.0, 4.0), 100.0);
        station.buffer_report(report("ev_1"));

        let record = &station.buffered()[0];
        assert_eq!(record.rsu_id, "S1");
        assert_eq!(record.rsu_position, Some(Position(3.0, 4.0)));
        assert_eq!(record.vehicle_type.as_deref(), Some("EV"));
        assert_eq!(record.battery_percentage, 80.0);
        assert!(record.collection_timestamp.is_some());
        assert!(station.is_connected("ev_1"));
    }

    #[tokio::test]
    async fn empty_buffer_succeeds_without_network() {
        let uplink = RecordingUplink::failing();
        let mut station = Station::new("S1", Position(0.0, 0.0), 10.0);

        assert!(station.transmit(&uplink, 10).await);
        assert!(uplink.sent().is_empty());
    }

    #[tokio::test]
    async fn successful_transmit_drains_oldest_first() {
        let uplink = RecordingUplink::default();
        let mut station = Station::new("S1", Position(0.0, 0.0), 10.0);
        for id in ["A", "B", "C"] {
            station.buffer_report(report(id));
        }

        assert!(station.transmit(&uplink, 2).await);

        let sent = uplink.sent();
        assert_eq!(sent.len(), 1);
        let sent_ids: Vec<&str> = sent[0].records.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(sent_ids, ["A", "B"]);
        assert_eq!(sent[0].station_id, "S1");
        assert_eq!(buffered_ids(&station), ["C"]);
    }

    #[tokio::test]
    async fn failed_transmit_keeps_buffer_intact() {
        let uplink = RecordingUplink::failing();
        let mut station = Station::new("S1", Position(0.0, 0.0), 10.0);
        for id in ["A", "B", "C"] {
            station.buffer_report(report(id));
        }

        assert!(!station.transmit(&uplink, 2).await);
        assert_eq!(buffered_ids(&station), ["A", "B", "C"]);

        uplink.set_failing(false);
        assert!(station.transmit(&uplink, 2).await);
        assert_eq!(buffered_ids(&station), ["C"]);
    }

    #[tokio::test]
    async fn zero_batch_size_sends_one_record() {
        let uplink = RecordingUplink::default();
        let mut station = Station::new("S1", Position(0.0, 0.0), 10.0);
        station.buffer_report(report("A"));
        station.buffer_report(report("B"));

        assert!(station.transmit(&uplink, 0).await);
        assert_eq!(uplink.sent()[0].records.len(), 1);
        assert_eq!(buffered_ids(&station), ["B"]);
    }

    #[test]
    fn context_cannot_shadow_record_fields() {
        let mut station = Station::new("S1", Position(0.0, 0.0), 10.0);
        let context = serde_json::json!({ "speed": 3.0, "rsu_id": "fake", "edge_id": "E0" });
        let serde_json::Value::Object(context) = context else { unreachable!() };
        station.buffer_report(report("A").with_context(context));

        let record = &station.buffered()[0];
        assert_eq!(record.speed, 5.0);
        assert_eq!(record.rsu_id, "S1");
        assert_eq!(record.context.len(), 1);
        assert_eq!(record.context_str("edge_id").as_deref(), Some("E0"));

        let batch = BatchPayload {
            station_id: "S1".to_string(),
            station_position: Position(0.0, 0.0),
            records: vec![record.clone()],
            sent_at: utc_now_iso(),
        };
        let raw = serde_json::to_string(&batch).unwrap();
        let parsed: BatchPayload = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.records[0], *record);
    }

    #[test]
    fn status_reports_counts() {
        let mut station = Station::new("S1", Position(0.0, 0.0), 25.0);
        station.buffer_report(report("A"));
        station.buffer_report(report("A"));
        station.buffer_report(report("B"));

        let status = station.status();
        assert_eq!(status.id, "S1");
        assert_eq!(status.coverage_radius, 25.0);
        assert_eq!(status.connected_count, 2);
        assert_eq!(status.buffered_count, 3);
    }
}
