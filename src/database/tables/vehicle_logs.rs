//! Tabla legada `vehicle_logs`: camino previo a las RSUs, sin atribución a estación.


use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use crate::config::sqlite::MAX_ROWS_PER_INSERT;
use crate::database::domain::VehicleLogRow;
use crate::message::domain::{CapacityValue, LegacyVehicleLog};


pub async fn create_table_vehicle_logs(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS vehicle_logs (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            ts_utc               TEXT NOT NULL,
            vehicle_id           TEXT NOT NULL,
            speed                REAL NOT NULL,
            battery_charge       REAL NOT NULL,
            battery_capacity     TEXT,
            sim_time             REAL NOT NULL
        );
        "#
    )
        .await?;

    Ok(())
}


pub async fn insert_vehicle_logs(conn: &mut SqliteConnection,
                                 ts_utc: &str,
                                 data_vec: &[LegacyVehicleLog]
) -> Result<(), sqlx::Error> {

    for chunk in data_vec.chunks(MAX_ROWS_PER_INSERT) {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO vehicle_logs (
                ts_utc, vehicle_id, speed, battery_charge, battery_capacity, sim_time
            ) "
        );

        query_builder.push_values(chunk, |mut b, data| {
            b.push_bind(ts_utc.to_string())
                .push_bind(data.vehicle_id.clone())
                .push_bind(data.speed)
                .push_bind(data.battery_charge)
                .push_bind(data.battery_capacity.as_ref().map(CapacityValue::as_text))
                .push_bind(data.sim_time);
        });

        let query = query_builder.build();
        query.execute(&mut *conn).await?;
    }

    Ok(())
}


pub async fn select_vehicle_logs(pool: &SqlitePool) -> Result<Vec<VehicleLogRow>, sqlx::Error> {
    sqlx::query_as::<_, VehicleLogRow>("SELECT * FROM vehicle_logs ORDER BY sim_time, id")
        .fetch_all(pool)
        .await
}


pub async fn delete_vehicle_logs(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM vehicle_logs").execute(conn).await?;
    Ok(())
}
