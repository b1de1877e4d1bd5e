pub mod domain;
pub mod queries;
pub mod repository;
pub mod tables;
