//! Bucle de recolección.
//!
//! Avanza el simulador, arma un `VehicleReport` por cada EV activo cada
//! `LOG_INTERVAL` segundos de simulación, lo rutea a la RSU más cercana y
//! vacía los buffers hacia el servicio de ingesta.


use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, instrument, warn};
use crate::collector::domain::{CollectionSettings, CollectionSummary, TrafficContext, TrafficLight, TrafficSimulator};
use crate::collector::replay::ReplaySimulator;
use crate::config::collection::{DEFAULT_STATIONS, STATUS_INTERVAL_STEPS};
use crate::config::traffic::{FALLBACK_LANE_LENGTH_M, TLS_LOOKAHEAD_EDGES, VEHICLE_FOOTPRINT_M};
use crate::message::domain::{Position, VehicleReport};
use crate::network::domain::{RouteOutcome, StationFlush, StationNetwork};
use crate::system::domain::{ErrorType, System};
use crate::uplink::domain::Uplink;
use crate::uplink::logic::HttpUplink;


fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}


/// Ocupación del tramo: `min(100, n / max(1, L / 7.5) * 100)`.
fn occupancy_percentage(vehicles_on_edge: usize, lane_length: f64) -> f64 {
    if lane_length <= 0.0 {
        return 0.0;
    }
    let capacity = (lane_length / VEHICLE_FOOTPRINT_M).max(1.0);
    round_2((vehicles_on_edge as f64 / capacity * 100.0).min(100.0))
}


/// Largo usado para la ocupación. Los carriles internos de intersección
/// (id con `:`) y las consultas fallidas usan el valor por defecto.
fn occupancy_lane_length<S: TrafficSimulator>(sim: &S, lane_id: Option<&str>) -> f64 {
    lane_id
        .filter(|lane| !lane.contains(':'))
        .and_then(|lane| sim.lane_length(lane))
        .unwrap_or(FALLBACK_LANE_LENGTH_M)
}


/// Recorre la ruta del vehículo hasta el primer tramo con semáforo al final.
///
/// La distancia es lo que resta del carril actual más el largo completo de
/// cada tramo siguiente. Sin ruta, sin largo o sin semáforo en
/// `TLS_LOOKAHEAD_EDGES` tramos devuelve `None`.
fn traffic_light_ahead<S: TrafficSimulator>(sim: &S,
                                            vehicle_id: &str,
                                            edge_id: &str,
                                            lane_id: Option<&str>,
                                            lane_position: f64) -> Option<(f64, TrafficLight)> {
    let route = sim.route(vehicle_id)?;
    let current = sim.route_index(vehicle_id)
        .filter(|index| *index < route.len())
        .or_else(|| route.iter().position(|edge| edge == edge_id))?;

    let current_length = lane_id
        .and_then(|lane| sim.lane_length(lane))
        .or_else(|| sim.edge_length(edge_id))?;
    let mut distance = (current_length - lane_position).max(0.0);

    if let Some(light) = sim.traffic_light_at_end(edge_id) {
        return Some((distance, light));
    }

    for edge in route.iter().skip(current + 1).take(TLS_LOOKAHEAD_EDGES) {
        distance += sim.edge_length(edge)?;
        if let Some(light) = sim.traffic_light_at_end(edge) {
            return Some((distance, light));
        }
    }
    None
}


/// Contexto de tráfico local de `vehicle_id` en el tick actual.
///
/// Nunca falla: cada dato que el simulador no pueda dar queda con su valor por defecto.
pub fn traffic_context<S: TrafficSimulator>(sim: &S, vehicle_id: &str) -> TrafficContext {
    let mut context = TrafficContext {
        edge_id: sim.road_id(vehicle_id),
        lane_id: sim.lane_id(vehicle_id),
        lane_position: sim.lane_position(vehicle_id),
        ..TrafficContext::default()
    };
    let own_position = context.lane_position.unwrap_or(0.0);

    let on_edge = context.edge_id
        .as_deref()
        .and_then(|edge| sim.edge_vehicle_ids(edge))
        .unwrap_or_default();

    for other in on_edge.iter().filter(|other| other.as_str() != vehicle_id) {
        let Some(other_position) = sim.lane_position(other) else {
            continue;
        };
        if other_position > own_position {
            context.vehicles_ahead_count += 1;
            if context.lane_id.is_some() && sim.lane_id(other) == context.lane_id {
                context.same_direction_ahead += 1;
            }
        }
    }

    let lane_length = occupancy_lane_length(sim, context.lane_id.as_deref());
    context.edge_occupancy_percentage = occupancy_percentage(on_edge.len(), lane_length);

    if let Some(edge) = context.edge_id.as_deref() {
        if let Some((distance, light)) = traffic_light_ahead(sim, vehicle_id, edge,
                                                             context.lane_id.as_deref(),
                                                             own_position) {
            context.distance_to_traffic_light = round_2(distance);
            context.next_traffic_light = light.id;
            context.traffic_light_state = light.state;
        }
    }

    context
}


/// Arma el reporte de un EV. Posición, velocidad y carga son obligatorias:
/// si alguna falla el vehículo se omite en este tick.
pub fn build_report<S: TrafficSimulator>(sim: &S, vehicle_id: &str, sim_time: f64) -> Option<VehicleReport> {
    let (Some(position), Some(speed), Some(charge)) = (sim.position(vehicle_id),
                                                       sim.speed(vehicle_id),
                                                       sim.battery_charge(vehicle_id)) else {
        warn!(vehicle = %vehicle_id, sim_time, "Warning: datos obligatorios no disponibles, vehículo omitido");
        return None;
    };

    // detenido => velocidad 0
    let speed = if sim.waiting_time(vehicle_id).unwrap_or(0.0) > 0.0 { 0.0 } else { speed };

    let report = VehicleReport::new(vehicle_id, position, speed, charge, sim.battery_capacity(vehicle_id), sim_time)
        .with_context(traffic_context(sim, vehicle_id).into_map());
    Some(report)
}


/// Recolecta un reporte por cada EV activo y lo rutea. Devuelve cuántos
/// reportes quedaron en el buffer de alguna RSU.
pub fn collect_tick<S, U>(sim: &S, network: &mut StationNetwork<U>, sim_time: f64) -> usize
where
    S: TrafficSimulator,
    U: Uplink,
{
    let mut routed = 0;

    for vehicle_id in sim.vehicle_ids() {
        let eligible = sim.has_battery_device(&vehicle_id);
        if !eligible {
            continue;
        }
        let Some(report) = build_report(sim, &vehicle_id, sim_time) else {
            continue;
        };
        if let RouteOutcome::Buffered(_) = network.route_report(report, eligible) {
            routed += 1;
        }
    }
    routed
}


/// Red con la disposición de RSUs por defecto.
pub fn setup_network<U: Uplink>(uplink: U, coverage_radius: f64) -> StationNetwork<U> {
    let mut network = StationNetwork::new(uplink);
    for (id, x, y) in DEFAULT_STATIONS {
        network.add_station(id, Position(x, y), coverage_radius);
    }
    info!("Info: red de {} RSUs inicializada", network.stations().len());
    network
}


fn log_failed_flushes(outcomes: &[StationFlush]) -> usize {
    let mut failed = 0;
    for outcome in outcomes.iter().filter(|outcome| !outcome.delivered) {
        warn!(station = %outcome.station_id, pending = outcome.pending,
              "Warning: la RSU conserva su buffer para el próximo intento");
        failed += 1;
    }
    failed
}


/// Corre la simulación completa.
///
/// Los fallos de envío no detienen el bucle: quedan en el buffer de la RSU y
/// se cuentan en `failed_flushes`.
#[instrument(
    name = "run_simulation_task",
    skip(sim, network, settings)
)]
pub async fn run_simulation<S, U>(sim: &mut S,
                                  network: &mut StationNetwork<U>,
                                  settings: &CollectionSettings) -> CollectionSummary
where
    S: TrafficSimulator,
    U: Uplink,
{
    let mut summary = CollectionSummary::default();
    let mut seen = HashSet::new();
    let mut last_collection = 0.0;

    while sim.step() {
        summary.steps += 1;
        let sim_time = sim.sim_time();
        seen.extend(sim.vehicle_ids());

        if sim_time - last_collection >= settings.log_interval_secs {
            last_collection = sim_time;
            summary.data_points += collect_tick(sim, network, sim_time);
            let outcomes = network.flush_all(settings.batch_size).await;
            summary.failed_flushes += log_failed_flushes(&outcomes);
        }

        if settings.status_interval_steps > 0 && summary.steps % settings.status_interval_steps == 0 {
            info!(step = summary.steps, sim_time, "Info: estado de la red");
            network.log_network_status();
        }
    }

    // Vaciado final: se repite mientras todas las RSUs entreguen y quede algo
    loop {
        let outcomes = network.flush_all(settings.batch_size).await;
        let failed = log_failed_flushes(&outcomes);
        summary.failed_flushes += failed;
        if failed > 0 || outcomes.iter().all(|outcome| outcome.pending == 0) {
            break;
        }
    }
    network.log_network_status();

    summary.vehicles_seen = seen.len();
    summary
}


/// Punto de entrada de la recolección: reproduce la traza en `trace_path`
/// contra el servicio en `SERVER_URL`.
#[instrument(name = "collection", skip(system, trace_path), fields(trace = %trace_path.display()))]
pub async fn start_collection(system: &System, trace_path: &Path) -> Result<CollectionSummary, ErrorType> {
    let mut sim = ReplaySimulator::from_file(trace_path)?;
    let uplink = HttpUplink::new(&system.server_url)?;

    match uplink.clear_remote().await {
        Ok(_) => info!("Info: datos previos del servidor eliminados"),
        Err(e) => error!("Error: no se pudieron limpiar los datos del servidor. {e}"),
    }

    let mut network = setup_network(uplink, system.rsu_coverage_radius);
    let settings = CollectionSettings {
        batch_size: system.rsu_batch_size,
        log_interval_secs: system.log_interval_secs,
        status_interval_steps: STATUS_INTERVAL_STEPS,
    };

    let summary = run_simulation(&mut sim, &mut network, &settings).await;
    info!(steps = summary.steps,
          vehicles_seen = summary.vehicles_seen,
          data_points = summary.data_points,
          failed_flushes = summary.failed_flushes,
          "Info: simulación finalizada");

    match network.uplink().fetch_station_stats().await {
        Ok(stats) => {
            for stat in stats.stations {
                info!(station = %stat.station_id,
                      entities = stat.total_entities_served,
                      records = stat.total_records,
                      last_update = ?stat.last_update,
                      "Info: estadísticas de RSU en el servidor");
            }
        }
        Err(e) => error!("Error: no se pudieron obtener las estadísticas del servidor. {e}"),
    }

    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::domain::context_keys;
    use crate::uplink::domain::mock::RecordingUplink;

    const STREET: &str = r#"{
        "edges": {
            "E0": { "length": 75.0 },
            "E1": { "length": 50.0 },
            "E2": { "length": 80.0, "traffic_light": { "id": "J7", "state": "GGrr" } }
        },
        "lanes": { "E0_0": 75.0, "E0_1": 75.0, ":J0_0": 9.0 },
        "ticks": [ { "sim_time": 10.0, "vehicles": [
            { "id": "ev", "position": [80.0, -8.0], "speed": 12.0,
              "battery": { "charge": 2400.0, "capacity": 3000.0 },
              "edge_id": "E0", "lane_id": "E0_0", "lane_position": 20.0,
              "route": ["E0", "E1", "E2"], "route_index": 0 },
            { "id": "car_a", "position": [85.0, -8.0], "speed": 10.0,
              "edge_id": "E0", "lane_id": "E0_0", "lane_position": 40.0 },
            { "id": "car_b", "position": [70.0, -8.0], "speed": 10.0,
              "edge_id": "E0", "lane_id": "E0_1", "lane_position": 30.0 },
            { "id": "stopped", "position": [0.0, 0.0], "speed": 0.4, "waiting_time": 3.0,
              "battery": { "charge": 100.0 },
              "edge_id": ":J0", "lane_id": ":J0_0", "lane_position": 1.0 }
        ] } ]
    }"#;

    fn street() -> ReplaySimulator {
        let mut sim = ReplaySimulator::from_json(STREET).unwrap();
        sim.step();
        sim
    }

    #[test]
    fn counts_vehicles_ahead_and_occupancy() {
        let context = traffic_context(&street(), "ev");

        assert_eq!(context.vehicles_ahead_count, 2);
        assert_eq!(context.same_direction_ahead, 1);
        // 3 vehículos en 75 m: capacidad 10
        assert_eq!(context.edge_occupancy_percentage, 30.0);
    }

    #[test]
    fn walks_route_to_next_traffic_light() {
        let context = traffic_context(&street(), "ev");

        // 55 m restantes de E0_0, luego E1 y E2 completos
        assert_eq!(context.distance_to_traffic_light, 55.0 + 50.0 + 80.0);
        assert_eq!(context.next_traffic_light, "J7");
        assert_eq!(context.traffic_light_state, "GGrr");
    }

    #[test]
    fn internal_lane_uses_fallbacks() {
        let context = traffic_context(&street(), "stopped");

        // carril interno: largo por defecto de 100 m
        assert_eq!(context.edge_occupancy_percentage, 7.5);
        assert_eq!(context.distance_to_traffic_light, -1.0);
        assert_eq!(context.next_traffic_light, "none");
        assert_eq!(context.traffic_light_state, "unknown");
    }

    #[test]
    fn occupancy_is_capped() {
        assert_eq!(occupancy_percentage(50, 75.0), 100.0);
        assert_eq!(occupancy_percentage(1, 3.0), 100.0);
        assert_eq!(occupancy_percentage(1, 22.5), 33.33);
        assert_eq!(occupancy_percentage(0, 0.0), 0.0);
    }

    #[test]
    fn builds_report_with_context() {
        let sim = street();
        let report = build_report(&sim, "ev", 10.0).unwrap();

        assert_eq!(report.speed, 12.0);
        assert_eq!(report.battery_percentage, 80.0);
        assert_eq!(report.context[context_keys::EDGE_ID], "E0");
        assert_eq!(report.context[context_keys::VEHICLES_AHEAD], 2);

        let stopped = build_report(&sim, "stopped", 10.0).unwrap();
        assert_eq!(stopped.speed, 0.0);
        assert_eq!(stopped.battery_percentage, 0.0);

        assert!(build_report(&sim, "car_a", 10.0).is_none());
    }

    const RUN: &str = r#"{
        "ticks": [
            { "sim_time": 5.0, "vehicles": [
                { "id": "ev_near", "position": [80.0, -8.0], "speed": 5.0, "battery": { "charge": 50.0, "capacity": 100.0 } }
            ] },
            { "sim_time": 10.0, "vehicles": [
                { "id": "ev_near", "position": [81.0, -8.0], "speed": 5.0, "battery": { "charge": 49.0, "capacity": 100.0 } },
                { "id": "ev_far", "position": [1000.0, 1000.0], "speed": 5.0, "battery": { "charge": 10.0 } },
                { "id": "car", "position": [80.0, -8.0], "speed": 5.0 }
            ] },
            { "sim_time": 20.0, "vehicles": [
                { "id": "ev_near", "position": [82.0, -8.0], "speed": 5.0, "battery": { "charge": 48.0, "capacity": 100.0 } }
            ] }
        ]
    }"#;

    fn settings() -> CollectionSettings {
        CollectionSettings { batch_size: 50, log_interval_secs: 10.0, status_interval_steps: 2 }
    }

    #[tokio::test]
    async fn run_routes_eligible_vehicles_to_nearest_station() {
        let mut sim = ReplaySimulator::from_json(RUN).unwrap();
        let mut network = setup_network(RecordingUplink::default(), 500.0);

        let summary = run_simulation(&mut sim, &mut network, &settings()).await;

        assert_eq!(summary, CollectionSummary { steps: 3, vehicles_seen: 3, data_points: 2, failed_flushes: 0 });
        let sent = network.uplink().sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|batch| batch.station_id == "RSU_Monihar"));
        assert_eq!(sent[0].records[0].sim_time, 10.0);
        assert_eq!(sent[1].records[0].battery_charge, 48.0);
    }

    #[tokio::test]
    async fn failed_uplink_keeps_records_buffered() {
        let mut sim = ReplaySimulator::from_json(RUN).unwrap();
        let mut network = setup_network(RecordingUplink::failing(), 500.0);

        let summary = run_simulation(&mut sim, &mut network, &settings()).await;

        // dos recolecciones y el vaciado final
        assert_eq!(summary.failed_flushes, 3);
        let monihar = network.stations().iter().find(|s| s.id() == "RSU_Monihar").unwrap();
        assert_eq!(monihar.buffered().len(), 2);
        assert!(network.uplink().sent().is_empty());
    }

    #[test]
    fn default_layout_has_seven_stations() {
        let network = setup_network(RecordingUplink::default(), 250.0);
        assert_eq!(network.stations().len(), 7);
        assert!(network.stations().iter().all(|s| s.coverage_radius() == 250.0));
    }
}
