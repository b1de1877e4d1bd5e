//! Consultas de análisis de solo lectura sobre el log crudo.
//!
//! Son las mismas agrupaciones que usan los scripts de análisis: por RSU, por
//! vehículo y por minuto de simulación.


use sqlx::SqlitePool;
use crate::database::domain::{StationSummaryRow, TimelineRow, VehicleTrajectoryRow};


pub async fn station_summary(pool: &SqlitePool) -> Result<Vec<StationSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, StationSummaryRow>(
        r#"
        SELECT
            rsu_id,
            COUNT(DISTINCT vehicle_id) AS unique_vehicles,
            COUNT(*)                   AS total_records,
            AVG(speed)                 AS avg_speed,
            MAX(speed)                 AS max_speed,
            MIN(speed)                 AS min_speed,
            AVG(battery_charge)        AS avg_battery,
            MIN(battery_charge)        AS min_battery
        FROM rsu_vehicle_logs
        GROUP BY rsu_id
        ORDER BY total_records DESC, rsu_id
        "#
    )
        .fetch_all(pool)
        .await
}


pub async fn vehicle_trajectories(pool: &SqlitePool,
                                  limit: i64
) -> Result<Vec<VehicleTrajectoryRow>, sqlx::Error> {
    sqlx::query_as::<_, VehicleTrajectoryRow>(
        r#"
        SELECT
            vehicle_id,
            COUNT(DISTINCT rsu_id)                       AS rsus_visited,
            COUNT(*)                                     AS data_points,
            MIN(battery_charge)                          AS min_battery,
            MAX(battery_charge)                          AS max_battery,
            (MAX(battery_charge) - MIN(battery_charge))  AS battery_consumed,
            AVG(speed)                                   AS avg_speed,
            MIN(sim_time)                                AS first_seen,
            MAX(sim_time)                                AS last_seen,
            (MAX(sim_time) - MIN(sim_time))              AS travel_time
        FROM rsu_vehicle_logs
        GROUP BY vehicle_id
        ORDER BY data_points DESC, vehicle_id
        LIMIT ?
        "#
    )
        .bind(limit)
        .fetch_all(pool)
        .await
}


pub async fn timeline(pool: &SqlitePool) -> Result<Vec<TimelineRow>, sqlx::Error> {
    sqlx::query_as::<_, TimelineRow>(
        r#"
        SELECT
            CAST(sim_time / 60 AS INTEGER) AS minute,
            COUNT(*)                       AS records,
            COUNT(DISTINCT vehicle_id)     AS active_vehicles,
            AVG(speed)                     AS avg_speed,
            AVG(battery_charge)            AS avg_battery
        FROM rsu_vehicle_logs
        GROUP BY minute
        ORDER BY minute
        "#
    )
        .fetch_all(pool)
        .await
}
