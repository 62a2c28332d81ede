use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Interval between SSE keep-alive comments on open push channels.
    pub keep_alive_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./data/recipes.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            keep_alive_secs: 30,
        }
    }
}

impl Config {
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database_path)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_creates_file_on_demand() {
        let config = Config {
            database_path: "/tmp/recipes.db".to_string(),
            ..Config::default()
        };
        assert_eq!(config.database_url(), "sqlite:/tmp/recipes.db?mode=rwc");
    }

    #[test]
    fn test_server_address() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.server_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_keep_alive_never_zero() {
        let config = Config {
            keep_alive_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(1));
    }
}
