use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub connection_timeout_seconds: u64,
    pub shutdown_grace_seconds: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("Invalid PORT"),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            shutdown_grace_seconds: env::var("SHUTDOWN_GRACE_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("Invalid SHUTDOWN_GRACE_SECONDS"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
