//! Red de RSUs: registro, ruteo por proximidad y envío en abanico.
//!
//! La red no guarda reportes propios; cada reporte elegible termina en el buffer
//! de la RSU en rango más cercana o se descarta.


use serde::Serialize;
use tracing::{info, warn};
use crate::message::domain::{Position, VehicleReport};
use crate::station::domain::{Station, StationStatus};
use crate::uplink::domain::Uplink;


/// Resultado de `flush_all` para una RSU.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StationFlush {
    pub station_id: String,
    pub delivered: bool,
    pub pending: usize,
}


/// Destino de un reporte ruteado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Vehículo no elegible: la red no se tocó.
    Ineligible,
    /// Quedó en el buffer de la RSU con este id.
    Buffered(String),
    /// Elegible pero fuera de toda cobertura: descartado con un warning.
    OutOfCoverage,
}


pub struct StationNetwork<U> {
    stations: Vec<Station>,
    uplink: U,
}


impl<U: Uplink> StationNetwork<U> {
    pub fn new(uplink: U) -> Self {
        Self {
            stations: Vec::new(),
            uplink,
        }
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Registra una RSU. Los ids deben ser únicos; no se verifica.
    pub fn add_station(&mut self, id: impl Into<String>, position: Position, coverage_radius: f64) {
        let station = Station::new(id, position, coverage_radius);
        info!(station = %station.id(), x = position.x(), y = position.y(), coverage_radius,
              "Info: RSU agregada a la red");
        self.stations.push(station);
    }

    fn nearest_index(&self, position: &Position) -> Option<usize> {
        let mut nearest = None;
        let mut min_distance = f64::INFINITY;

        for (index, station) in self.stations.iter().enumerate() {
            if !station.is_in_range(position) {
                continue;
            }
            let distance = station.distance_to(position);
            // `<` estricto: ante empate gana la registrada primero
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(index);
            }
        }
        nearest
    }

    /// RSU en rango más cercana a `position`, o `None` si ninguna la cubre.
    pub fn find_nearest_station(&self, position: &Position) -> Option<&Station> {
        self.nearest_index(position).map(|index| &self.stations[index])
    }

    /// Entrega el reporte a la RSU en rango más cercana.
    ///
    /// Con `eligible == false` no hace nada. Un vehículo elegible fuera de toda
    /// cobertura se descarta con un warning; no se reintenta.
    pub fn route_report(&mut self, report: VehicleReport, eligible: bool) -> RouteOutcome {
        if !eligible {
            return RouteOutcome::Ineligible;
        }

        match self.nearest_index(&report.position) {
            Some(index) => {
                let station = &mut self.stations[index];
                station.buffer_report(report);
                RouteOutcome::Buffered(station.id().to_string())
            }
            None => {
                warn!(vehicle = %report.vehicle_id, x = report.position.x(), y = report.position.y(),
                      "Warning: EV fuera del rango de todas las RSUs, reporte descartado");
                RouteOutcome::OutOfCoverage
            }
        }
    }

    /// Llama a `transmit` en cada RSU en orden de registro.
    ///
    /// Nunca falla en conjunto: el resultado de cada RSU queda en la lista devuelta.
    pub async fn flush_all(&mut self, max_batch_size: usize) -> Vec<StationFlush> {
        let mut outcomes = Vec::with_capacity(self.stations.len());

        for station in self.stations.iter_mut() {
            let delivered = station.transmit(&self.uplink, max_batch_size).await;
            outcomes.push(StationFlush {
                station_id: station.id().to_string(),
                delivered,
                pending: station.buffered().len(),
            });
        }
        outcomes
    }

    pub fn network_status(&self) -> Vec<StationStatus> {
        self.stations.iter().map(Station::status).collect()
    }

    pub fn log_network_status(&self) {
        for status in self.network_status() {
            info!(station = %status.id,
                  x = status.position.x(),
                  y = status.position.y(),
                  coverage_radius = status.coverage_radius,
                  connected = status.connected_count,
                  buffered = status.buffered_count,
                  "Info: estado de RSU");
        }
    }
}
