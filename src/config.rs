use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Allowed browser origin for the dashboard.
    pub cors_origin: String,
    /// "development" unless APP_ENV / RUST_ENV says otherwise.
    pub environment: String,
    pub lakehouse: LakehouseConfig,
    pub storage: StorageConfig,
}

/// Connection settings for the external lakehouse platform.
#[derive(Debug, Clone)]
pub struct LakehouseConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub instance_id: String,
    pub instance_name: String,
    /// Engine name sent with every query submission.
    pub query_engine: String,
    pub default_engine: EngineDefaults,
    pub default_bucket: BucketDefaults,
    /// Renew this long before the token expires.
    pub token_lead_time: Duration,
    /// Lifetime assumed when the platform omits `expires_in`.
    pub default_token_lifetime: Duration,
    pub request_timeout: Duration,
    /// Set to false for self-signed certificates in development.
    pub verify_tls: bool,
}

/// Spark resources applied to ingestion jobs unless the request overrides them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineDefaults {
    pub engine_id: String,
    pub driver_memory: String,
    pub driver_cores: u32,
    pub executor_memory: String,
    pub executor_cores: u32,
    pub num_executors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketDefaults {
    pub bucket_name: String,
    pub bucket_type: String,
}

/// S3-compatible object storage used by the upload relay.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub max_upload_bytes: usize,
    pub verify_tls: bool,
}

impl Default for LakehouseConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:6443".into(),
            username: "ibmlhadmin".into(),
            password: "password".into(),
            instance_id: "0000-0000-0000-0000".into(),
            instance_name: String::new(),
            query_engine: "presto-01".into(),
            default_engine: EngineDefaults {
                engine_id: "spark158".into(),
                driver_memory: "4G".into(),
                driver_cores: 2,
                executor_memory: "4G".into(),
                executor_cores: 2,
                num_executors: 1,
            },
            default_bucket: BucketDefaults {
                bucket_name: "iceberg-bucket".into(),
                bucket_type: "minio".into(),
            },
            token_lead_time: Duration::from_secs(5 * 60),
            default_token_lifetime: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
            verify_tls: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:9000".into(),
            region: "us-east-1".into(),
            access_key_id: "admin".into(),
            secret_access_key: "password".into(),
            max_upload_bytes: 100 * 1024 * 1024,
            verify_tls: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".into(),
            cors_origin: "http://localhost:3000".into(),
            environment: "development".into(),
            lakehouse: LakehouseConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let environment = std::env::var("APP_ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .unwrap_or_else(|_| "development".into());

    let defaults = LakehouseConfig::default();
    let engine = EngineDefaults {
        engine_id: env_or("LAKEHOUSE_ENGINE_ID", &defaults.default_engine.engine_id),
        ..defaults.default_engine.clone()
    };
    let bucket = BucketDefaults {
        bucket_name: env_or("LAKEHOUSE_BUCKET_NAME", &defaults.default_bucket.bucket_name),
        ..defaults.default_bucket.clone()
    };

    let password = env_or("LAKEHOUSE_PASSWORD", &defaults.password);
    if password == defaults.password {
        if environment == "production" {
            anyhow::bail!(
                "LAKEHOUSE_PASSWORD is still the development default. \
                 Set real platform credentials before running in production."
            );
        }
        eprintln!("⚠️  LAKEHOUSE_PASSWORD is not set; using the development default.");
    }

    let lakehouse = LakehouseConfig {
        base_url: env_or("LAKEHOUSE_BASE_URL", &defaults.base_url)
            .trim_end_matches('/')
            .to_string(),
        username: env_or("LAKEHOUSE_USERNAME", &defaults.username),
        password,
        instance_id: env_or("LAKEHOUSE_INSTANCE_ID", &defaults.instance_id),
        instance_name: env_or("LAKEHOUSE_INSTANCE_NAME", &defaults.instance_name),
        query_engine: env_or("LAKEHOUSE_QUERY_ENGINE", &defaults.query_engine),
        default_engine: engine,
        default_bucket: bucket,
        token_lead_time: env_millis("LAKEHOUSE_TOKEN_LEAD_MS", defaults.token_lead_time),
        default_token_lifetime: env_millis(
            "LAKEHOUSE_TOKEN_LIFETIME_MS",
            defaults.default_token_lifetime,
        ),
        request_timeout: env_millis("LAKEHOUSE_TIMEOUT_MS", defaults.request_timeout),
        // Self-signed certificates are accepted outside production unless told otherwise.
        verify_tls: std::env::var("LAKEHOUSE_VERIFY_TLS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(environment == "production"),
    };

    let storage_defaults = StorageConfig::default();
    let storage = StorageConfig {
        endpoint: env_or("STORAGE_ENDPOINT", &storage_defaults.endpoint),
        region: env_or("STORAGE_REGION", &storage_defaults.region),
        access_key_id: env_or("STORAGE_ACCESS_KEY", &storage_defaults.access_key_id),
        secret_access_key: env_or("STORAGE_SECRET_KEY", &storage_defaults.secret_access_key),
        max_upload_bytes: std::env::var("STORAGE_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(storage_defaults.max_upload_bytes),
        verify_tls: std::env::var("STORAGE_VERIFY_TLS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(environment == "production"),
    };

    Ok(Config {
        port: std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .unwrap_or(5000),
        host: env_or("HOST", "0.0.0.0"),
        cors_origin: env_or("CORS_ORIGIN", "http://localhost:3000"),
        environment,
        lakehouse,
        storage,
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
