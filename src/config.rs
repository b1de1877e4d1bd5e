pub mod uplink {
    use std::time::Duration;

    pub const TIMEOUT: Duration = Duration::from_secs(5);
}

pub mod sqlite {
    use std::time::Duration;

    pub const WAIT_FOR: Duration = Duration::from_secs(5);
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);
    /// 24 columnas por fila, bajo el límite de 32766 parámetros de SQLite.
    pub const MAX_ROWS_PER_INSERT: usize = 400;
    pub const DEFAULT_DATA_LIMIT: i64 = 1000;
    pub const DEFAULT_VEHICLE_LIMIT: i64 = 10;
}

pub mod traffic {
    pub const VEHICLE_FOOTPRINT_M: f64 = 7.5;
    pub const FALLBACK_LANE_LENGTH_M: f64 = 100.0;
    pub const TLS_LOOKAHEAD_EDGES: usize = 10;
    pub const NO_TLS_DISTANCE: f64 = -1.0;
    pub const NO_TLS_ID: &str = "none";
    pub const UNKNOWN_TLS_STATE: &str = "unknown";
    pub const VEHICLE_TYPE_EV: &str = "EV";
}

pub mod collection {
    pub const STATUS_INTERVAL_STEPS: u64 = 100;

    /// Ubicación de las RSUs en las intersecciones principales de la red vial.
    pub const DEFAULT_STATIONS: [(&str, f64, f64); 7] = [
        ("RSU_Chachra", -165.47, -199.59),
        ("RSU_Dhormotola", -194.59, 27.16),
        ("RSU_Doratana", -44.04, 49.98),
        ("RSU_Monihar", 79.98, -8.38),
        ("RSU_Muroli", 223.72, -213.15),
        ("RSU_NewMarket", 2.93, 170.72),
        ("RSU_Palbari", -218.70, 214.90),
    ];
}
