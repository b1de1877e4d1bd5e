//! Definición del Contexto de Aplicación (Shared State).
//!
//! El `AppContext` agrupa los recursos que el servicio de ingesta comparte entre
//! solicitudes concurrentes (Repositorio y Configuración). No guarda estado de
//! sesión: cada solicitud se resuelve contra la base.


use std::sync::Arc;
use crate::database::repository::Repository;
use crate::system::domain::System;


#[derive(Clone, Debug)]
pub struct AppContext {
    pub repo: Repository,
    pub system: Arc<System>,
}


impl AppContext {
    pub async fn new(system: System) -> Self {
        let repo = Repository::create_repository(&system.database_url, system.db_pool_size).await;
        Self::with_repository(repo, system)
    }

    pub fn with_repository(repo: Repository, system: System) -> Self {
        Self { repo, system: Arc::new(system) }
    }
}
