//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Este módulo actúa como la fuente única de verdad para la configuración de la aplicación.
//! Se encarga de leer las variables de entorno, establecer valores por defecto
//! y proveer las estructuras necesarias para iniciar los subsistemas
//! (Base de Datos, Servicio HTTP, Red de RSUs, Logging).
//!
//! # Funcionalidades Principales
//! * **Carga de Configuración:** Lee de `.env` en desarrollo y variables de sistema en producción.
//! * **Observabilidad:** Configura `tracing_subscriber` para logs estructurados o legibles.
//! * **Errores:** Define la taxonomía de errores operativos (`ErrorType`).


use std::env;
use std::str::FromStr;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};


/// Representa la configuración global del sistema y el estado del entorno.
///
/// Centraliza todas las variables de entorno necesarias tanto para el servicio
/// de ingesta como para el bucle de recolección de la simulación.
#[derive(Debug, Clone)]
pub struct System {
    /// URL de la base SQLite (ej. `sqlite://telemetry.db`).
    /// Por defecto: `sqlite://telemetry.db`. El archivo se crea si no existe.
    pub database_url: String,

    /// Tamaño máximo del pool de conexiones a la base de datos.
    /// Por defecto: `5`.
    pub db_pool_size: u32,

    /// Host donde escuchará el servicio HTTP de ingesta.
    /// Por defecto: `127.0.0.1`.
    pub http_host: String,

    /// Puerto del servicio HTTP de ingesta.
    /// Por defecto: `8000`.
    pub http_port: u16,

    /// URL base del servicio de ingesta usada por las RSUs.
    /// Por defecto: `http://127.0.0.1:8000`.
    pub server_url: String,

    /// Cantidad máxima de registros que cada RSU envía por lote.
    /// Por defecto: `100`.
    pub rsu_batch_size: usize,

    /// Radio de cobertura (metros) de las RSUs por defecto.
    /// Por defecto: `500.0`.
    pub rsu_coverage_radius: f64,

    /// Segundos de simulación entre dos recolecciones consecutivas.
    /// Por defecto: `10.0`.
    pub log_interval_secs: f64,

    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    /// Afecta el formato de logs y la carga de archivos `.env`.
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    /// Se autoconfigura según el `environment` si no se especifica.
    pub rust_log: String,
}


impl Default for System {
    fn default() -> Self {
        Self {
            database_url: "sqlite://telemetry.db".to_string(),
            db_pool_size: 5,
            http_host: "127.0.0.1".to_string(),
            http_port: 8000,
            server_url: "http://127.0.0.1:8000".to_string(),
            rsu_batch_size: 100,
            rsu_coverage_radius: 500.0,
            log_interval_secs: 10.0,
            environment: "development".to_string(),
            rust_log: "debug".to_string(),
        }
    }
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Toda variable ausente toma el valor de `System::default()`.
    ///
    /// # Errores
    /// * `ErrorType::Config` si una variable numérica no puede interpretarse.
    pub fn new() -> Result<Self, ErrorType> {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        let defaults = System::default();

        Ok(System {
            database_url: env::var("DATABASE_URL")
                .unwrap_or(defaults.database_url),

            db_pool_size: parse_var("DB_POOL_SIZE", defaults.db_pool_size)?,

            http_host: env::var("HTTP_HOST")
                .unwrap_or(defaults.http_host),

            http_port: parse_var("HTTP_PORT", defaults.http_port)?,

            server_url: env::var("SERVER_URL")
                .unwrap_or(defaults.server_url),

            rsu_batch_size: parse_var("RSU_BATCH_SIZE", defaults.rsu_batch_size)?,

            rsu_coverage_radius: parse_var("RSU_COVERAGE_RADIUS", defaults.rsu_coverage_radius)?,

            log_interval_secs: parse_var("LOG_INTERVAL_SECS", defaults.log_interval_secs)?,

            rust_log: env::var("RUST_LOG")
                .unwrap_or_else(|_| {
                    match environment.as_str() {
                        "development" => "debug".to_string(),
                        "staging" => "info".to_string(),
                        _ => "warn".to_string(),
                    }
                }),

            environment,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}


fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ErrorType> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ErrorType::Config(format!("{key} debe ser un número, recibido '{raw}'"))),
        Err(_) => Ok(default),
    }
}


/// Categorización de errores operativos del sistema.
#[derive(Debug, thiserror::Error)]
pub enum ErrorType {
    /// Lote sin registros. Rechazado por el servicio de ingesta.
    #[error("Empty payload")]
    EmptyBatch,

    #[error("error de base de datos: {0}")]
    Database(#[from] sqlx::Error),

    /// Fallo de transporte RSU -> servicio (timeout, conexión, estado no 2xx).
    #[error("error de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("configuración inválida: {0}")]
    Config(String),

    /// Archivo de traza de simulación inválido.
    #[error("traza inválida: {0}")]
    Trace(String),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("error de serialización: {0}")]
    Json(#[from] serde_json::Error),
}


impl IntoResponse for ErrorType {
    fn into_response(self) -> Response {
        let status = match self {
            ErrorType::EmptyBatch => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Error: solicitud fallida. {self}");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}


/// Marca de tiempo UTC en ISO-8601 con precisión de segundos y sufijo `Z`.
pub fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
///
/// # Argumentos
/// * `system`: Referencia a la configuración cargada para leer el nivel de log (`rust_log`).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }

    info!("Info: tracing inicializado en entorno {}", system.environment);
}
