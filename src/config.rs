//! Configuration for AIVerse
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::types::AiverseError;

/// AIVerse - metered AI operations gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "aiverse")]
#[command(about = "Metered AI operations gateway with creation ledger and community feed")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores allowed, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "aiverse")]
    pub mongodb_db: String,

    /// Secret shared with the identity provider for token verification
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Comma-separated list of allowed CORS origins
    #[arg(long, env = "CORS_ORIGINS", default_value = "http://localhost:5173")]
    pub cors_origins: String,

    /// Lifetime free calls per user for free-tier operations
    #[arg(long, env = "FREE_USAGE_LIMIT", default_value = "10")]
    pub free_usage_limit: u32,

    /// Timeout for AI and media provider calls in milliseconds
    #[arg(long, env = "PROVIDER_TIMEOUT_MS", default_value = "60000")]
    pub provider_timeout_ms: u64,

    /// Maximum accepted resume size in bytes
    #[arg(long, env = "MAX_RESUME_BYTES", default_value = "5242880")]
    pub max_resume_bytes: usize,

    /// Maximum accepted request body in bytes (uploads included)
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,

    /// Provider configuration
    #[command(flatten)]
    pub providers: ProviderArgs,

    /// JSONL usage log path (disabled when unset)
    #[arg(long, env = "USAGE_LOG_PATH")]
    pub usage_log_path: Option<PathBuf>,
}

/// AI and media provider configuration
#[derive(Parser, Debug, Clone)]
pub struct ProviderArgs {
    /// API key for the generative-text endpoint
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// OpenAI-compatible base URL of the generative-text endpoint
    #[arg(
        long,
        env = "AI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta/openai/"
    )]
    pub ai_base_url: String,

    /// Chat model used for text generation
    #[arg(long, env = "AI_MODEL", default_value = "gemini-2.0-flash")]
    pub ai_model: String,

    /// ClipDrop text-to-image API key
    #[arg(long, env = "CLIPDROP_API_KEY")]
    pub clipdrop_api_key: Option<String>,

    /// ClipDrop text-to-image endpoint
    #[arg(
        long,
        env = "CLIPDROP_URL",
        default_value = "https://clipdrop-api.co/text-to-image/v1"
    )]
    pub clipdrop_url: String,

    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key
    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API secret
    #[arg(long, env = "CLOUDINARY_API_SECRET")]
    pub cloudinary_api_secret: Option<String>,
}

impl Args {
    /// Build the token validator (falls back to the dev secret in dev mode)
    pub fn jwt_validator(&self) -> Result<JwtValidator, AiverseError> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), 3600),
            (None, true) => Ok(JwtValidator::new_dev()),
            (None, false) => Err(AiverseError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }

    /// Provider call timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Parsed CORS allow-list
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the given Origin header value is allowed
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.cors_origin_list().iter().any(|o| o == "*" || o == origin)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }

            let missing = self.providers.missing_credentials();
            if !missing.is_empty() {
                return Err(format!(
                    "Provider credentials required in production mode: {}",
                    missing.join(", ")
                ));
            }
        }

        if self.free_usage_limit == 0 {
            return Err("FREE_USAGE_LIMIT must be at least 1".to_string());
        }

        if self.provider_timeout_ms == 0 {
            return Err("PROVIDER_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.max_resume_bytes > self.max_upload_bytes {
            return Err("MAX_RESUME_BYTES must not exceed MAX_UPLOAD_BYTES".to_string());
        }

        Ok(())
    }
}

impl ProviderArgs {
    /// Names of the credential variables that are not set
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if self.clipdrop_api_key.is_none() {
            missing.push("CLIPDROP_API_KEY");
        }
        if self.cloudinary_cloud_name.is_none() {
            missing.push("CLOUDINARY_CLOUD_NAME");
        }
        if self.cloudinary_api_key.is_none() {
            missing.push("CLOUDINARY_API_KEY");
        }
        if self.cloudinary_api_secret.is_none() {
            missing.push("CLOUDINARY_API_SECRET");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["aiverse"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_dev_mode_validates_without_secrets() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.free_usage_limit, 10);
        assert_eq!(args.max_resume_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&["--gemini-api-key", "k"]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("JWT_SECRET"));
    }

    #[test]
    fn test_production_requires_provider_credentials() {
        let args = parse(&["--jwt-secret", "0123456789abcdef0123456789abcdef"]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("CLIPDROP_API_KEY"));
    }

    #[test]
    fn test_cors_origins() {
        let args = parse(&[
            "--dev-mode",
            "--cors-origins",
            "http://localhost:5173, https://ai-verse.example.app/",
        ]);
        assert!(args.is_allowed_origin("http://localhost:5173"));
        assert!(args.is_allowed_origin("https://ai-verse.example.app"));
        assert!(!args.is_allowed_origin("https://evil.example"));
    }
}
