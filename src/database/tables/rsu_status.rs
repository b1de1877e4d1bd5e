//! Módulo de persistencia para el log de estado de RSUs (una fila por lote aceptado).
//!


use sqlx::{Executor, SqliteConnection, SqlitePool};
use crate::database::domain::{RsuStatusRow, StationStatRow};
use crate::message::domain::Position;


/// Crea la tabla `rsu_status`.
///
/// # Schema
/// * `vehicle_count`: Vehículos distintos dentro del lote.
/// * `data_records`: Registros del lote.
/// * `sent_at`: Marca de envío informada por la RSU.
pub async fn create_table_rsu_status(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS rsu_status (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            ts_utc               TEXT NOT NULL,
            rsu_id               TEXT NOT NULL,
            rsu_position_x       REAL NOT NULL,
            rsu_position_y       REAL NOT NULL,
            vehicle_count        INTEGER NOT NULL,
            data_records         INTEGER NOT NULL,
            sent_at              TEXT
        );
        "#
    )
        .await?;

    Ok(())
}


pub async fn insert_rsu_status(conn: &mut SqliteConnection,
                               ts_utc: &str,
                               rsu_id: &str,
                               rsu_position: Position,
                               vehicle_count: i64,
                               data_records: i64,
                               sent_at: &str
) -> Result<(), sqlx::Error> {

    sqlx::query(
        "INSERT INTO rsu_status (
            ts_utc, rsu_id, rsu_position_x, rsu_position_y,
            vehicle_count, data_records, sent_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
        .bind(ts_utc)
        .bind(rsu_id)
        .bind(rsu_position.x())
        .bind(rsu_position.y())
        .bind(vehicle_count)
        .bind(data_records)
        .bind(sent_at)
        .execute(conn)
        .await?;

    Ok(())
}


pub async fn select_rsu_status(pool: &SqlitePool) -> Result<Vec<RsuStatusRow>, sqlx::Error> {
    sqlx::query_as::<_, RsuStatusRow>("SELECT * FROM rsu_status ORDER BY ts_utc, id")
        .fetch_all(pool)
        .await
}


/// Agrega el log de estado por RSU.
///
/// `total_entities_served` suma los conteos por lote: no deduplica vehículos
/// entre lotes.
pub async fn select_station_stats(pool: &SqlitePool) -> Result<Vec<StationStatRow>, sqlx::Error> {
    sqlx::query_as::<_, StationStatRow>(
        r#"
        SELECT
            rsu_id,
            MAX(rsu_position_x) AS rsu_position_x,
            MAX(rsu_position_y) AS rsu_position_y,
            SUM(vehicle_count)  AS total_entities_served,
            SUM(data_records)   AS total_records,
            MAX(ts_utc)         AS last_update
        FROM rsu_status
        GROUP BY rsu_id
        ORDER BY rsu_id
        "#
    )
        .fetch_all(pool)
        .await
}


pub async fn delete_rsu_status(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rsu_status").execute(conn).await?;
    Ok(())
}
