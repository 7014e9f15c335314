use crate::error::HubError;

const DEFAULT_PORT: u16 = 3000;

/// Process configuration, resolved once at startup from the environment.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, HubError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| HubError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self { port })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_port_3000_when_unset() {
        std::env::remove_var("PORT");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn rejects_non_numeric_port() {
        std::env::set_var("PORT", "not-a-port");
        let result = Config::from_env();
        std::env::remove_var("PORT");
        assert!(result.is_err());
    }
}
