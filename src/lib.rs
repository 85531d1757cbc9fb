pub mod app;
pub mod config;
pub mod error;
pub mod media_type;
pub mod photo;
pub mod routes;
pub mod service;
pub mod storage;
pub mod telemetry;
