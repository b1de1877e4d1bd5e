use std::collections::HashSet;
use std::str::FromStr;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{error, info};
use tokio::time::sleep;
use crate::config::sqlite::{BUSY_TIMEOUT, WAIT_FOR};
use crate::database::domain::{RsuStatusRow, RsuVehicleLogRow, StationSummaryRow, TimelineRow,
                              VehicleLogRow, VehicleTrajectoryRow};
use crate::database::queries;
use crate::database::tables::rsu_status::{create_table_rsu_status, delete_rsu_status, insert_rsu_status,
                                          select_rsu_status, select_station_stats};
use crate::database::tables::rsu_vehicle_logs::{create_table_rsu_vehicle_logs, delete_rsu_vehicle_logs,
                                                insert_rsu_vehicle_logs, select_rsu_vehicle_logs};
use crate::database::tables::vehicle_logs::{create_table_vehicle_logs, delete_vehicle_logs,
                                            insert_vehicle_logs, select_vehicle_logs};
use crate::message::domain::{BatchPayload, IngestAck, LegacyAck, LegacyVehicleLog, StationStat};
use crate::system::domain::{utc_now_iso, ErrorType};


#[derive(Clone, Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = create_pool(database_url, pool_size).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn create_repository(database_url: &str, pool_size: u32) -> Self {
        loop {
            match Self::new(database_url, pool_size).await {
                Ok(repo) => {
                    info!("Info: repositorio listo en {database_url}");
                    return repo
                }
                Err(e) => {
                    error!("Error inicializando repo: {:?}", e);
                    sleep(WAIT_FOR).await;
                }
            }
        }
    }

    /// Persiste un lote de una RSU en una sola transacción.
    ///
    /// Todas las filas del log crudo y la fila de `rsu_status` se confirman
    /// juntas o ninguna. El lote vacío se rechaza sin tocar la base.
    pub async fn ingest_batch(&self, batch: &BatchPayload) -> Result<IngestAck, ErrorType> {
        if batch.records.is_empty() {
            return Err(ErrorType::EmptyBatch);
        }

        let received_at = utc_now_iso();
        let vehicle_count = batch.records
            .iter()
            .map(|r| r.vehicle_id.as_str())
            .collect::<HashSet<_>>()
            .len() as i64;
        let data_records = batch.records.len() as i64;

        let mut tx = self.pool.begin().await?;

        insert_rsu_vehicle_logs(&mut tx, &received_at, &batch.station_id,
                                batch.station_position, &batch.records).await?;

        insert_rsu_status(&mut tx, &received_at, &batch.station_id, batch.station_position,
                          vehicle_count, data_records, &batch.sent_at).await?;

        tx.commit().await?;

        info!(station = %batch.station_id, records = data_records, vehicles = vehicle_count,
              "Info: lote de RSU persistido");

        Ok(IngestAck {
            status: "ok".to_string(),
            station_id: batch.station_id.clone(),
            inserted: data_records as u64,
            timestamp: received_at,
        })
    }

    /// Camino legado: registros planos sin RSU hacia `vehicle_logs`.
    pub async fn ingest_legacy(&self, logs: &[LegacyVehicleLog]) -> Result<LegacyAck, ErrorType> {
        if logs.is_empty() {
            return Err(ErrorType::EmptyBatch);
        }

        let received_at = utc_now_iso();
        let mut tx = self.pool.begin().await?;
        insert_vehicle_logs(&mut tx, &received_at, logs).await?;
        tx.commit().await?;

        Ok(LegacyAck {
            status: "ok".to_string(),
            inserted: logs.len() as u64,
        })
    }

    pub async fn station_stats(&self) -> Result<Vec<StationStat>, sqlx::Error> {
        let rows = select_station_stats(&self.pool).await?;
        Ok(rows.into_iter().map(StationStat::from).collect())
    }

    /// Vacía las tres tablas en una transacción. Irreversible.
    pub async fn clear_all(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        delete_rsu_vehicle_logs(&mut tx).await?;
        delete_rsu_status(&mut tx).await?;
        delete_vehicle_logs(&mut tx).await?;
        tx.commit().await?;

        info!("Info: datos de telemetría eliminados");
        Ok(())
    }

    pub async fn raw_records(&self, rsu_id: Option<&str>, limit: i64) -> Result<Vec<RsuVehicleLogRow>, sqlx::Error> {
        select_rsu_vehicle_logs(&self.pool, rsu_id, limit).await
    }

    pub async fn status_log(&self) -> Result<Vec<RsuStatusRow>, sqlx::Error> {
        select_rsu_status(&self.pool).await
    }

    pub async fn legacy_logs(&self) -> Result<Vec<VehicleLogRow>, sqlx::Error> {
        select_vehicle_logs(&self.pool).await
    }

    pub async fn station_summary(&self) -> Result<Vec<StationSummaryRow>, sqlx::Error> {
        queries::station_summary(&self.pool).await
    }

    pub async fn vehicle_trajectories(&self, limit: i64) -> Result<Vec<VehicleTrajectoryRow>, sqlx::Error> {
        queries::vehicle_trajectories(&self.pool, limit).await
    }

    pub async fn timeline(&self) -> Result<Vec<TimelineRow>, sqlx::Error> {
        queries::timeline(&self.pool).await
    }
}


async fn create_pool(database_url: &str, pool_size: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await?;

    Ok(pool)
}


async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_table_rsu_vehicle_logs(pool).await?;
    create_table_rsu_status(pool).await?;
    create_table_vehicle_logs(pool).await?;
    Ok(())
}
