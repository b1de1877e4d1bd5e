//! Servicio HTTP de ingesta.
//!
//! Recibe lotes de las RSUs, los persiste y expone consultas de solo lectura
//! sobre los datos almacenados. Cada solicitud es independiente; el único estado
//! compartido es el `AppContext`.


use std::future::Future;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};
use crate::config::sqlite::{DEFAULT_DATA_LIMIT, DEFAULT_VEHICLE_LIMIT};
use crate::context::domain::AppContext;
use crate::message::domain::{BatchPayload, ClearAck, IngestAck, LegacyAck, LegacyVehicleLog, StationStatsResponse};
use crate::system::domain::ErrorType;


#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub rsu_id: Option<String>,
    pub limit: Option<i64>,
}


#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}


/// Sin límite de tamaño de cuerpo: un lote de `RSU_BATCH_SIZE` registros con
/// contexto puede superar el límite por defecto de axum (2 MB).
pub fn router(app_context: AppContext) -> Router {
    Router::new()
        .route("/ingest_rsu", post(ingest_rsu))
        .route("/ingest", post(ingest_legacy))
        .route("/rsu_stats", get(rsu_stats))
        .route("/rsu_data", get(rsu_data))
        .route("/clear_data", delete(clear_data))
        .route("/analysis/stations", get(analysis_stations))
        .route("/analysis/vehicles", get(analysis_vehicles))
        .route("/analysis/timeline", get(analysis_timeline))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .with_state(app_context)
}


async fn ingest_rsu(State(ctx): State<AppContext>,
                    Json(batch): Json<BatchPayload>) -> Result<Json<IngestAck>, ErrorType> {
    if batch.records.is_empty() {
        warn!(station = %batch.station_id, "Warning: lote vacío rechazado");
    }
    let ack = ctx.repo.ingest_batch(&batch).await?;
    Ok(Json(ack))
}


async fn ingest_legacy(State(ctx): State<AppContext>,
                       Json(logs): Json<Vec<LegacyVehicleLog>>) -> Result<Json<LegacyAck>, ErrorType> {
    let ack = ctx.repo.ingest_legacy(&logs).await?;
    Ok(Json(ack))
}


async fn rsu_stats(State(ctx): State<AppContext>) -> Result<Json<StationStatsResponse>, ErrorType> {
    let stations = ctx.repo.station_stats().await?;
    Ok(Json(StationStatsResponse { stations }))
}


async fn rsu_data(State(ctx): State<AppContext>,
                  Query(query): Query<DataQuery>) -> Result<Json<Value>, ErrorType> {
    let limit = query.limit.unwrap_or(DEFAULT_DATA_LIMIT);
    let records = ctx.repo.raw_records(query.rsu_id.as_deref(), limit).await?;
    Ok(Json(json!({ "records": records })))
}


async fn clear_data(State(ctx): State<AppContext>) -> Result<Json<ClearAck>, ErrorType> {
    ctx.repo.clear_all().await?;
    Ok(Json(ClearAck { status: "cleared".to_string() }))
}


async fn analysis_stations(State(ctx): State<AppContext>) -> Result<Json<Value>, ErrorType> {
    let stations = ctx.repo.station_summary().await?;
    Ok(Json(json!({ "stations": stations })))
}


async fn analysis_vehicles(State(ctx): State<AppContext>,
                           Query(query): Query<LimitQuery>) -> Result<Json<Value>, ErrorType> {
    let limit = query.limit.unwrap_or(DEFAULT_VEHICLE_LIMIT);
    let vehicles = ctx.repo.vehicle_trajectories(limit).await?;
    Ok(Json(json!({ "vehicles": vehicles })))
}


async fn analysis_timeline(State(ctx): State<AppContext>) -> Result<Json<Value>, ErrorType> {
    let minutes = ctx.repo.timeline().await?;
    Ok(Json(json!({ "minutes": minutes })))
}


async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}


/// Atiende solicitudes en `listener` hasta que `shutdown` se resuelva.
pub async fn serve<F>(listener: TcpListener,
                      app_context: AppContext,
                      shutdown: F) -> Result<(), ErrorType>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(app_context))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}


/// Punto de entrada del servicio: escucha en `HTTP_HOST:HTTP_PORT` hasta Ctrl+C.
#[instrument(name = "http_service", skip(app_context))]
pub async fn start_http(app_context: AppContext) -> Result<(), ErrorType> {
    let addr = app_context.system.http_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Info: servicio de ingesta escuchando en {addr}");

    serve(listener, app_context, async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Warning: no se pudo escuchar la señal de apagado");
        }
        info!("Info: apagando servicio de ingesta");
    }).await
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::testing::memory_repository;
    use crate::message::domain::{Position, VehicleReport};
    use crate::network::domain::StationNetwork;
    use crate::system::domain::System;
    use crate::uplink::logic::HttpUplink;

    async fn spawn_service() -> (String, AppContext) {
        let ctx = AppContext::with_repository(memory_repository().await, System::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, ctx.clone(), std::future::pending::<()>()));
        (format!("http://{addr}"), ctx)
    }

    #[tokio::test]
    async fn report_flows_from_station_to_store() {
        let (base_url, ctx) = spawn_service().await;
        let mut network = StationNetwork::new(HttpUplink::new(&base_url).unwrap());
        network.add_station("S1", Position(0.0, 0.0), 100.0);

        let report = VehicleReport::new("ev_1", Position(50.0, 0.0), 10.0, 80.0, Some(100.0), 30.0);
        network.route_report(report, true);
        assert_eq!(network.stations()[0].buffered()[0].battery_percentage, 80.0);

        let outcomes = network.flush_all(50).await;
        assert!(outcomes[0].delivered);
        assert_eq!(outcomes[0].pending, 0);

        let rows = ctx.repo.raw_records(None, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rsu_id, "S1");
        assert_eq!(rows[0].speed, 10.0);
        assert_eq!(rows[0].battery_percentage, 80.0);

        let status = ctx.repo.status_log().await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].data_records, 1);
        assert_eq!(status[0].vehicle_count, 1);

        let stats = network.uplink().fetch_station_stats().await.unwrap();
        assert_eq!(stats.stations.len(), 1);
        assert_eq!(stats.stations[0].station_id, "S1");
        assert_eq!(stats.stations[0].total_records, 1);
    }

    #[tokio::test]
    async fn unreachable_service_leaves_buffer_queued() {
        let mut network = StationNetwork::new(HttpUplink::new("http://127.0.0.1:1").unwrap());
        network.add_station("S1", Position(0.0, 0.0), 100.0);
        network.route_report(VehicleReport::new("ev_1", Position(1.0, 1.0), 1.0, 1.0, None, 0.0), true);

        let outcomes = network.flush_all(50).await;
        assert!(!outcomes[0].delivered);
        assert_eq!(network.stations()[0].buffered().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_gets_client_error() {
        let (base_url, ctx) = spawn_service().await;
        let response = reqwest::Client::new()
            .post(format!("{base_url}/ingest_rsu"))
            .json(&json!({
                "station_id": "S1",
                "station_position": [0.0, 0.0],
                "records": [],
                "sent_at": "2026-01-01T00:00:00Z"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["detail"], "Empty payload");
        assert!(ctx.repo.status_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_data_empties_stats() {
        let (base_url, ctx) = spawn_service().await;
        let client = reqwest::Client::new();

        let legacy = client
            .post(format!("{base_url}/ingest"))
            .json(&json!([{"vehicle_id": "v1", "speed": 3.0, "battery_charge": 10.0,
                           "battery_capacity": "100", "sim_time": 10.0}]))
            .send()
            .await
            .unwrap();
        assert!(legacy.status().is_success());
        assert_eq!(ctx.repo.legacy_logs().await.unwrap().len(), 1);

        let uplink = HttpUplink::new(&base_url).unwrap();
        let ack = uplink.clear_remote().await.unwrap();
        assert_eq!(ack.status, "cleared");
        assert!(ctx.repo.legacy_logs().await.unwrap().is_empty());
        assert!(uplink.fetch_station_stats().await.unwrap().stations.is_empty());
    }

    #[tokio::test]
    async fn read_endpoints_return_stored_rows() {
        let (base_url, _ctx) = spawn_service().await;
        let mut network = StationNetwork::new(HttpUplink::new(&base_url).unwrap());
        network.add_station("S1", Position(0.0, 0.0), 100.0);
        network.add_station("S2", Position(500.0, 0.0), 100.0);
        network.route_report(VehicleReport::new("ev_1", Position(10.0, 0.0), 5.0, 50.0, Some(100.0), 70.0), true);
        network.route_report(VehicleReport::new("ev_2", Position(490.0, 0.0), 7.0, 60.0, Some(100.0), 10.0), true);
        network.flush_all(50).await;

        let client = reqwest::Client::new();
        let data: Value = client.get(format!("{base_url}/rsu_data?rsu_id=S2"))
            .send().await.unwrap().json().await.unwrap();
        assert_eq!(data["records"].as_array().unwrap().len(), 1);
        assert_eq!(data["records"][0]["vehicle_id"], "ev_2");

        let timeline: Value = client.get(format!("{base_url}/analysis/timeline"))
            .send().await.unwrap().json().await.unwrap();
        let minutes: Vec<i64> = timeline["minutes"].as_array().unwrap()
            .iter().map(|m| m["minute"].as_i64().unwrap()).collect();
        assert_eq!(minutes, [0, 1]);

        let vehicles: Value = client.get(format!("{base_url}/analysis/vehicles?limit=1"))
            .send().await.unwrap().json().await.unwrap();
        assert_eq!(vehicles["vehicles"].as_array().unwrap().len(), 1);

        let health: Value = client.get(format!("{base_url}/health"))
            .send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn large_backlog_is_accepted_in_one_batch() {
        let (base_url, ctx) = spawn_service().await;
        let mut network = StationNetwork::new(HttpUplink::new(&base_url).unwrap());
        network.add_station("S1", Position(0.0, 0.0), 100.0);

        let padding = "x".repeat(600);
        for i in 0..4000 {
            let mut context = serde_json::Map::new();
            context.insert("note".to_string(), Value::String(padding.clone()));
            let report = VehicleReport::new(format!("ev_{i}"), Position(1.0, 1.0), 5.0, 40.0, Some(50.0), i as f64)
                .with_context(context);
            network.route_report(report, true);
        }
        let body = serde_json::to_vec(&network.stations()[0].buffered()).unwrap();
        assert!(body.len() > 2 * 1024 * 1024);

        let outcomes = network.flush_all(4000).await;
        assert!(outcomes[0].delivered);
        assert_eq!(outcomes[0].pending, 0);
        assert_eq!(ctx.repo.raw_records(None, 5000).await.unwrap().len(), 4000);
    }

    #[tokio::test]
    async fn reserved_context_key_does_not_block_station() {
        let (base_url, ctx) = spawn_service().await;
        let mut network = StationNetwork::new(HttpUplink::new(&base_url).unwrap());
        network.add_station("S1", Position(0.0, 0.0), 100.0);

        let mut context = serde_json::Map::new();
        context.insert("speed".to_string(), json!(3.0));
        network.route_report(VehicleReport::new("ev", Position(1.0, 1.0), 9.0, 40.0, None, 1.0)
                                 .with_context(context), true);
        network.route_report(VehicleReport::new("ev2", Position(2.0, 1.0), 7.0, 40.0, None, 2.0), true);

        let outcomes = network.flush_all(50).await;
        assert!(outcomes[0].delivered);

        let rows = ctx.repo.raw_records(None, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle_id, "ev");
        assert_eq!(rows[0].speed, 9.0);
        assert_eq!(rows[1].vehicle_id, "ev2");
    }
}
