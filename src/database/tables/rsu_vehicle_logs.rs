//! Módulo de persistencia para el log crudo de registros transmitidos por RSU.
//!


use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use crate::config::sqlite::MAX_ROWS_PER_INSERT;
use crate::database::domain::RsuVehicleLogRow;
use crate::message::domain::{context_keys, Position, ReportRecord};


/// Crea la tabla `rsu_vehicle_logs`.
///
/// Una fila por registro recibido. Sin clave natural: un lote reenviado
/// produce filas duplicadas. Las columnas de contexto de tráfico admiten `NULL`.
pub async fn create_table_rsu_vehicle_logs(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS rsu_vehicle_logs (
            id                          INTEGER PRIMARY KEY AUTOINCREMENT,
            ts_utc                      TEXT NOT NULL,
            rsu_id                      TEXT NOT NULL,
            rsu_position_x              REAL NOT NULL,
            rsu_position_y              REAL NOT NULL,
            vehicle_id                  TEXT NOT NULL,
            vehicle_type                TEXT,
            position_x                  REAL NOT NULL,
            position_y                  REAL NOT NULL,
            speed                       REAL NOT NULL,
            battery_charge              REAL NOT NULL,
            battery_capacity            REAL,
            battery_percentage          REAL NOT NULL,
            sim_time                    REAL NOT NULL,
            collection_timestamp        TEXT,
            edge_id                     TEXT,
            lane_id                     TEXT,
            lane_position               REAL,
            vehicles_ahead_count        INTEGER,
            same_direction_ahead        INTEGER,
            distance_to_traffic_light   REAL,
            next_traffic_light          TEXT,
            traffic_light_state         TEXT,
            edge_occupancy_percentage   REAL,
            extra                       TEXT
        );
        "#
    )
        .await?;

    Ok(())
}


/// Inserta los registros de un lote dentro de la transacción abierta en `conn`.
///
/// Divide en sentencias de a `MAX_ROWS_PER_INSERT` filas para no superar el
/// límite de parámetros de SQLite.
///
/// # Argumentos
/// * `ts_utc`: Marca de recepción compartida por todo el lote.
pub async fn insert_rsu_vehicle_logs(conn: &mut SqliteConnection,
                                     ts_utc: &str,
                                     rsu_id: &str,
                                     rsu_position: Position,
                                     data_vec: &[ReportRecord]
) -> Result<(), sqlx::Error> {

    for chunk in data_vec.chunks(MAX_ROWS_PER_INSERT) {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO rsu_vehicle_logs (
                ts_utc, rsu_id, rsu_position_x, rsu_position_y,
                vehicle_id, vehicle_type, position_x, position_y,
                speed, battery_charge, battery_capacity, battery_percentage,
                sim_time, collection_timestamp, edge_id, lane_id, lane_position,
                vehicles_ahead_count, same_direction_ahead, distance_to_traffic_light,
                next_traffic_light, traffic_light_state, edge_occupancy_percentage, extra
            ) "
        );

        query_builder.push_values(chunk, |mut b, data| {
            b.push_bind(ts_utc.to_string())
                .push_bind(rsu_id.to_string())
                .push_bind(rsu_position.x())
                .push_bind(rsu_position.y())
                .push_bind(data.vehicle_id.clone())
                .push_bind(data.vehicle_type.clone())
                .push_bind(data.position.x())
                .push_bind(data.position.y())
                .push_bind(data.speed)
                .push_bind(data.battery_charge)
                .push_bind(data.battery_capacity)
                .push_bind(data.battery_percentage)
                .push_bind(data.sim_time)
                .push_bind(data.collection_timestamp.clone())
                .push_bind(data.context_str(context_keys::EDGE_ID))
                .push_bind(data.context_str(context_keys::LANE_ID))
                .push_bind(data.context_f64(context_keys::LANE_POSITION))
                .push_bind(data.context_i64(context_keys::VEHICLES_AHEAD))
                .push_bind(data.context_i64(context_keys::SAME_DIRECTION_AHEAD))
                .push_bind(data.context_f64(context_keys::DISTANCE_TO_TLS))
                .push_bind(data.context_str(context_keys::NEXT_TLS))
                .push_bind(data.context_str(context_keys::TLS_STATE))
                .push_bind(data.context_f64(context_keys::EDGE_OCCUPANCY))
                .push_bind(data.extra_context());
        });

        let query = query_builder.build();
        query.execute(&mut *conn).await?;
    }

    Ok(())
}


/// Registros crudos ordenados por tiempo de simulación, opcionalmente de una sola RSU.
pub async fn select_rsu_vehicle_logs(pool: &SqlitePool,
                                     rsu_id: Option<&str>,
                                     limit: i64
) -> Result<Vec<RsuVehicleLogRow>, sqlx::Error> {

    let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT * FROM rsu_vehicle_logs"
    );

    if let Some(rsu_id) = rsu_id {
        query_builder.push(" WHERE rsu_id = ").push_bind(rsu_id.to_string());
    }

    query_builder.push(" ORDER BY sim_time, rsu_id, id LIMIT ").push_bind(limit);

    query_builder
        .build_query_as::<RsuVehicleLogRow>()
        .fetch_all(pool)
        .await
}


pub async fn delete_rsu_vehicle_logs(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rsu_vehicle_logs").execute(conn).await?;
    Ok(())
}
