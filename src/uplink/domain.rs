//! Enlace RSU -> servicio de ingesta.
//!
//! Las RSUs no conocen el transporte concreto: solo necesitan algo que entregue
//! un `BatchPayload` y devuelva la confirmación o un error.


use std::future::Future;
use crate::message::domain::{BatchPayload, IngestAck};
use crate::system::domain::ErrorType;


pub trait Uplink {
    /// Entrega un lote al servicio de ingesta.
    ///
    /// Cualquier resultado distinto de una confirmación 2xx es un `Err`.
    fn send_batch(&self, batch: &BatchPayload) -> impl Future<Output = Result<IngestAck, ErrorType>> + Send;
}
