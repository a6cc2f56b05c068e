/// Configuration management for the ingestion service
///
/// Loads configuration from environment variables with sensible defaults,
/// following the same `Config::from_env` shape used across this codebase's
/// services.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub concurrency: ConcurrencyConfig,
    pub autoscale: AutoscaleConfig,
    pub auth: AuthConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
    R2,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub storage_root: String,
    pub s3_bucket: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    pub r2_account_id: Option<String>,
    pub r2_access_key_id: Option<String>,
    pub r2_secret_access_key: Option<String>,
    pub r2_bucket: Option<String>,
    pub r2_endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Memory,
    Redis,
    Sqs,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub redis_url: String,
    pub redis_queue_name: String,
    pub sqs_queue_url: Option<String>,
    pub consumer_count: usize,
    pub poll_timeout_seconds: u64,
    pub task_timeout_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConcurrencyConfig {
    pub chunk_size_bytes: u64,
    pub max_retries: u32,
    pub worker_count: usize,
    pub task_queue_maxsize: usize,
    pub max_global_inflight_chunks: usize,
    pub max_inflight_chunks_per_upload: usize,
    pub max_fair_inflight_chunks_per_upload: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AutoscaleConfig {
    pub enabled: bool,
    pub min_workers: usize,
    pub max_workers: usize,
    pub cooldown_seconds: u64,
    pub scale_up_queue_threshold: usize,
    pub scale_up_utilization_threshold: f64,
    pub scale_down_utilization_threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    ApiKey,
    Jwt,
    Hybrid,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub api_key_mappings: Vec<(String, String)>,
    pub admin_user_ids: Vec<String>,
    pub api_rate_limit_per_minute: u32,
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub jwt_audience: Option<String>,
    pub jwt_issuer: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MaintenanceConfig {
    pub cleanup_enabled: bool,
    pub cleanup_interval_seconds: u64,
    pub stale_upload_ttl_seconds: i64,
    pub idempotency_ttl_seconds: i64,
}

const MIB: u64 = 1024 * 1024;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let worker_count = env_u("WORKER_COUNT", 16) as usize;

        Ok(Config {
            app: AppConfig {
                host: env_s("INGEST_HOST", "0.0.0.0"),
                port: env_u("INGEST_PORT", 8080) as u16,
                env: env_s("APP_ENV", "development"),
                name: "chunked-ingest",
                version: env!("CARGO_PKG_VERSION"),
            },
            database: DatabaseConfig {
                url: env_s("DATABASE_URL", "postgresql://localhost/ingest"),
                max_connections: env_u("DATABASE_MAX_CONNECTIONS", 10) as u32,
            },
            storage: StorageConfig {
                backend: match env_s("STORAGE_BACKEND", "local").as_str() {
                    "s3" => StorageBackend::S3,
                    "r2" => StorageBackend::R2,
                    _ => StorageBackend::Local,
                },
                storage_root: env_s("STORAGE_ROOT", "./data/uploads"),
                s3_bucket: std::env::var("S3_BUCKET").ok(),
                aws_region: env_s("AWS_REGION", "us-east-1"),
                aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
                r2_account_id: std::env::var("R2_ACCOUNT_ID").ok(),
                r2_access_key_id: std::env::var("R2_ACCESS_KEY_ID").ok(),
                r2_secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY").ok(),
                r2_bucket: std::env::var("R2_BUCKET").ok(),
                r2_endpoint: std::env::var("R2_ENDPOINT").ok(),
            },
            queue: QueueConfig {
                backend: match env_s("QUEUE_BACKEND", "memory").as_str() {
                    "redis" => QueueBackend::Redis,
                    "sqs" => QueueBackend::Sqs,
                    _ => QueueBackend::Memory,
                },
                redis_url: env_s("REDIS_URL", "redis://localhost"),
                redis_queue_name: env_s("REDIS_QUEUE_NAME", "ingest:chunk-writes"),
                sqs_queue_url: std::env::var("SQS_QUEUE_URL").ok(),
                consumer_count: env_u("QUEUE_CONSUMER_COUNT", 4) as usize,
                poll_timeout_seconds: env_u("QUEUE_POLL_TIMEOUT_SECONDS", 5),
                task_timeout_seconds: env_u("QUEUE_TASK_TIMEOUT_SECONDS", 30),
            },
            concurrency: ConcurrencyConfig {
                chunk_size_bytes: env_u("CHUNK_SIZE_BYTES", 5 * MIB),
                max_retries: env_u("MAX_RETRIES", 3) as u32,
                worker_count,
                task_queue_maxsize: env_u("TASK_QUEUE_MAXSIZE", 512) as usize,
                max_global_inflight_chunks: env_u("MAX_GLOBAL_INFLIGHT_CHUNKS", 128) as usize,
                max_inflight_chunks_per_upload: env_u("MAX_INFLIGHT_CHUNKS_PER_UPLOAD", 8) as usize,
                max_fair_inflight_chunks_per_upload: {
                    let v = env_u("MAX_FAIR_INFLIGHT_CHUNKS_PER_UPLOAD", 0) as usize;
                    if v == 0 {
                        (worker_count / 2).max(1)
                    } else {
                        v
                    }
                },
            },
            autoscale: AutoscaleConfig {
                enabled: env_bool("AUTOSCALE_ENABLED", false),
                min_workers: env_u("MIN_WORKERS", 4) as usize,
                max_workers: env_u("MAX_WORKERS", 32) as usize,
                cooldown_seconds: env_u("AUTOSCALE_COOLDOWN_SECONDS", 30),
                scale_up_queue_threshold: env_u("SCALE_UP_QUEUE_THRESHOLD", 10) as usize,
                scale_up_utilization_threshold: env_f("SCALE_UP_UTILIZATION_THRESHOLD", 0.8),
                scale_down_utilization_threshold: env_f("SCALE_DOWN_UTILIZATION_THRESHOLD", 0.2),
            },
            auth: AuthConfig {
                mode: match env_s("AUTH_MODE", "api_key").as_str() {
                    "jwt" => AuthMode::Jwt,
                    "hybrid" => AuthMode::Hybrid,
                    _ => AuthMode::ApiKey,
                },
                api_key_mappings: parse_mappings(&env_s("API_KEY_MAPPINGS", "")),
                admin_user_ids: env_s("ADMIN_USER_IDS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                api_rate_limit_per_minute: env_u("API_RATE_LIMIT_PER_MINUTE", 600) as u32,
                jwt_secret: env_s("JWT_SECRET", "dev-secret-change-me"),
                jwt_algorithm: env_s("JWT_ALGORITHM", "HS256"),
                jwt_audience: std::env::var("JWT_AUDIENCE").ok(),
                jwt_issuer: std::env::var("JWT_ISSUER").ok(),
            },
            maintenance: MaintenanceConfig {
                cleanup_enabled: env_bool("CLEANUP_ENABLED", true),
                cleanup_interval_seconds: env_u("CLEANUP_INTERVAL_SECONDS", 300),
                stale_upload_ttl_seconds: env_u("STALE_UPLOAD_TTL_SECONDS", 86_400) as i64,
                idempotency_ttl_seconds: env_u("IDEMPOTENCY_TTL_SECONDS", 604_800) as i64,
            },
        })
    }

    pub fn multipart_eligible(&self, total_chunks: u64, chunk_size_bytes: u64) -> bool {
        matches!(self.storage.backend, StorageBackend::S3 | StorageBackend::R2)
            && total_chunks > 1
            && chunk_size_bytes >= 5 * MIB
    }
}

fn env_s(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_mappings(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, ':');
            let key = parts.next()?.trim();
            let user = parts.next()?.trim();
            if key.is_empty() || user.is_empty() {
                None
            } else {
                Some((key.to_string(), user.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_key_mappings() {
        let mappings = parse_mappings("k1:u1,k2:u2");
        assert_eq!(
            mappings,
            vec![
                ("k1".to_string(), "u1".to_string()),
                ("k2".to_string(), "u2".to_string())
            ]
        );
    }

    #[test]
    fn multipart_requires_s3_and_min_chunk_size() {
        let mut cfg = minimal_config();
        cfg.storage.backend = StorageBackend::Local;
        assert!(!cfg.multipart_eligible(3, 5 * MIB));

        cfg.storage.backend = StorageBackend::S3;
        assert!(cfg.multipart_eligible(3, 5 * MIB));
        assert!(!cfg.multipart_eligible(1, 5 * MIB));
        assert!(!cfg.multipart_eligible(3, MIB));
    }

    fn minimal_config() -> Config {
        std::env::set_var("DATABASE_URL", "postgresql://localhost/test");
        Config::from_env().expect("config loads with defaults")
    }
}
