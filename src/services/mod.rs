/// Upload coordinator - business logic for the ingestion control plane
///
/// Orchestrates init/upload/missing/complete/download, owns the upload
/// lifecycle state machine, and routes chunk persistence through either
/// the worker pool (local) or the durable queue + rendezvous store
/// (external backends).
pub mod upload_coordinator;

pub use upload_coordinator::UploadCoordinator;
