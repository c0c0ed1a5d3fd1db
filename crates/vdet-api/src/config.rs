//! API configuration.

use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;
use vdet_inference::ModelPaths;
use vdet_media::SegmentPolicy;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Max request body size (uploads included)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Directory for request-scoped uploads
    pub temp_dir: PathBuf,
    /// Directory for rendered annotated videos
    pub annotated_dir: PathBuf,
    /// ONNX model locations
    pub models: ModelPaths,
    /// Maximum inferences running at once
    pub max_concurrent_inference: usize,
    /// Videos shorter than this are scored as one window
    pub full_video_below_secs: f64,
    /// Maximum number of alerts kept in memory
    pub alert_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_rps: 10,
            max_body_size: 512 * 1024 * 1024, // 512MB
            environment: "development".to_string(),
            temp_dir: PathBuf::from("temp_videos"),
            annotated_dir: PathBuf::from("annotated_videos"),
            models: ModelPaths::default(),
            max_concurrent_inference: 2,
            full_video_below_secs: SegmentPolicy::default().full_video_below_secs,
            alert_capacity: 1000,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let models = ModelPaths {
            dir: std::env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models.dir.clone()),
            cnn_lstm: std::env::var("CNN_LSTM_MODEL").unwrap_or(defaults.models.cnn_lstm.clone()),
            i3d: std::env::var("I3D_MODEL").unwrap_or(defaults.models.i3d.clone()),
            two_stream: std::env::var("TWO_STREAM_MODEL")
                .unwrap_or(defaults.models.two_stream.clone()),
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            annotated_dir: std::env::var("ANNOTATED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.annotated_dir),
            models,
            max_concurrent_inference: env_parse::<usize>("MAX_CONCURRENT_INFERENCE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_inference),
            full_video_below_secs: env_parse("FULL_VIDEO_BELOW_SECS")
                .unwrap_or(defaults.full_video_below_secs),
            alert_capacity: env_parse::<usize>("ALERT_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.alert_capacity),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Segmentation policy with the configured full-video cutoff.
    pub fn segment_policy(&self) -> SegmentPolicy {
        SegmentPolicy {
            full_video_below_secs: self.full_video_below_secs,
            ..SegmentPolicy::default()
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub jwt_secret: String,
    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: i64,
    /// Admin account created at startup, if set.
    pub bootstrap_admin: Option<(String, String)>,
}

impl AuthConfig {
    /// Load auth settings from the environment.
    ///
    /// | Env Var                        | Default                  |
    /// |--------------------------------|--------------------------|
    /// | `JWT_SECRET`                   | random (development only) |
    /// | `ACCESS_TOKEN_EXPIRE_MINUTES`  | `30`                     |
    /// | `ADMIN_EMAIL`/`ADMIN_PASSWORD` | none                     |
    ///
    /// Returns `None` in production when `JWT_SECRET` is missing.
    pub fn from_env(production: bool) -> Option<Self> {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if production => return None,
            _ => {
                warn!("JWT_SECRET not set, using a random per-process secret");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };

        let bootstrap_admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Some(Self {
            jwt_secret,
            access_token_expire_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES").unwrap_or(30),
            bootstrap_admin,
        })
    }

    /// Fixed-secret config for tests and tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            access_token_expire_minutes: 30,
            bootstrap_admin: None,
        }
    }
}
