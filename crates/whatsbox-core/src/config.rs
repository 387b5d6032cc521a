//! Environment-backed configuration.
//!
//! Every knob has a default so a bare `whatsbox` invocation works out of the
//! box; anything security-relevant (admin password) defaults to "disabled"
//! rather than to a guessable value.

use std::env;
use std::time::Duration;

use rand::RngCore;

const DEFAULT_MAX_UPLOAD_SIZE: i64 = 2 * 1024 * 1024 * 1024; // 2 GiB

#[derive(Clone, Debug)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    // Storage locations
    pub database_path: String,
    pub wa_session_path: String,
    pub temp_dir: String,

    // Upload policy
    pub max_upload_size: i64,
    pub default_expiry_days: i64,
    pub max_expiry_days: i64,
    pub short_id_length: usize,

    // Logging
    pub log_level: String,
    pub log_format: String,
    pub log_output: String,
    pub log_file_path: String,

    // Graceful shutdown
    pub shutdown_timeout: Duration,

    // Admin auth
    pub admin_password: String,
    pub admin_session_secret: String,
    pub admin_session_max_age: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Config {
            host: get_env("HOST", "0.0.0.0"),
            port: get_env("PORT", "3000")
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid port number"))?,

            database_path: get_env("DATABASE_PATH", "./data/whatsbox.db"),
            wa_session_path: get_env("WA_SESSION_PATH", "./data/wa_session.db"),
            temp_dir: get_env("TEMP_DIR", "./data/temp"),

            max_upload_size: get_env_i64("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE),
            default_expiry_days: get_env_i64("DEFAULT_EXPIRY_DAYS", 30),
            max_expiry_days: get_env_i64("MAX_EXPIRY_DAYS", 30),
            short_id_length: get_env_i64("SHORT_ID_LENGTH", 6) as usize,

            log_level: get_env("LOG_LEVEL", "info"),
            log_format: get_env("LOG_FORMAT", "json"),
            log_output: get_env("LOG_OUTPUT", "stdout"),
            log_file_path: get_env("LOG_FILE_PATH", "./data/logs/whatsbox.log"),

            shutdown_timeout: Duration::from_secs(get_env_i64("SHUTDOWN_TIMEOUT", 300) as u64),

            admin_password: get_env("ADMIN_PASSWORD", ""),
            admin_session_secret: env::var("ADMIN_SESSION_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(generate_session_secret),
            admin_session_max_age: get_env_i64("ADMIN_SESSION_MAX_AGE", 86400),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_size <= 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE must be positive"));
        }
        if self.default_expiry_days < 1 || self.default_expiry_days > self.max_expiry_days {
            return Err(anyhow::anyhow!(
                "DEFAULT_EXPIRY_DAYS must be in 1..=MAX_EXPIRY_DAYS"
            ));
        }
        if self.short_id_length < 4 || self.short_id_length > 32 {
            return Err(anyhow::anyhow!("SHORT_ID_LENGTH must be in 4..=32"));
        }
        Ok(())
    }

    pub fn admin_enabled(&self) -> bool {
        !self.admin_password.is_empty()
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// RNG failure here would mean signing admin sessions with a predictable
/// key, so it is a hard abort.
fn generate_session_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng()
        .try_fill_bytes(&mut bytes)
        .expect("failed to generate admin session secret");
    hex::encode(bytes)
}
