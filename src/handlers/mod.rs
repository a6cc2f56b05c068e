/// HTTP handlers for the chunked ingestion control plane
pub mod admin;
pub mod health;
pub mod uploads;
