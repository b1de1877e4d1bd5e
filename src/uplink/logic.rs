use reqwest::Client;
use tracing::{debug, instrument};
use crate::config::uplink::TIMEOUT;
use crate::message::domain::{BatchPayload, ClearAck, IngestAck, StationStatsResponse};
use crate::system::domain::ErrorType;
use super::domain::Uplink;


/// Cliente HTTP del servicio de ingesta.
///
/// Todas las solicitudes tienen un timeout acotado (`TIMEOUT`); un timeout es
/// un fallo de transporte ordinario.
#[derive(Clone, Debug)]
pub struct HttpUplink {
    client: Client,
    base_url: String,
}


impl HttpUplink {
    pub fn new(base_url: &str) -> Result<Self, ErrorType> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `DELETE /clear_data`.
    pub async fn clear_remote(&self) -> Result<ClearAck, ErrorType> {
        let ack = self.client
            .delete(self.url("/clear_data"))
            .send()
            .await?
            .error_for_status()?
            .json::<ClearAck>()
            .await?;
        Ok(ack)
    }

    /// `GET /rsu_stats`.
    pub async fn fetch_station_stats(&self) -> Result<StationStatsResponse, ErrorType> {
        let stats = self.client
            .get(self.url("/rsu_stats"))
            .send()
            .await?
            .error_for_status()?
            .json::<StationStatsResponse>()
            .await?;
        Ok(stats)
    }
}


impl Uplink for HttpUplink {
    #[instrument(name = "send_batch", skip(self, batch), fields(station = %batch.station_id, records = batch.records.len()))]
    async fn send_batch(&self, batch: &BatchPayload) -> Result<IngestAck, ErrorType> {
        debug!("Debug: enviando lote a {}", self.base_url);

        let ack = self.client
            .post(self.url("/ingest_rsu"))
            .json(batch)
            .send()
            .await?
            .error_for_status()?
            .json::<IngestAck>()
            .await?;
        Ok(ack)
    }
}
