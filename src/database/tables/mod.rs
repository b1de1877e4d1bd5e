pub mod rsu_status;
pub mod rsu_vehicle_logs;
pub mod vehicle_logs;
