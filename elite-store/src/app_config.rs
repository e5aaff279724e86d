use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub paystack_secret_key: Option<String>,
    #[serde(default)]
    pub arkesel_api_key: Option<String>,
    pub arkesel_sender_id: String,
    #[serde(default)]
    pub gas_webhook_url: Option<String>,
    #[serde(default)]
    pub admin_emails: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .set_default("server.port", 8787)?
            .set_default("database.url", "sqlite://elite.db?mode=rwc")?
            .set_default("arkesel_sender_id", "EliteTransport")?
            // Optional configuration files, then the environment on top.
            // The external-service variables are flat (PAYSTACK_SECRET_KEY,
            // ARKESEL_API_KEY, ARKESEL_SENDER_ID, GAS_WEBHOOK_URL,
            // ADMIN_EMAILS); nested sections use __ (SERVER__PORT).
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Administrator flag: case-insensitive membership in the configured
    /// comma-separated allow-list. There is no database-side role.
    pub fn is_admin(&self, email: &str) -> bool {
        let needle = email.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.admin_emails
            .split(',')
            .map(|entry| entry.trim().to_ascii_lowercase())
            .any(|entry| !entry.is_empty() && entry == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_admins(admins: &str) -> Settings {
        Settings {
            server: ServerConfig { port: 0 },
            database: DatabaseConfig {
                url: String::new(),
            },
            paystack_secret_key: None,
            arkesel_api_key: None,
            arkesel_sender_id: "EliteTransport".to_string(),
            gas_webhook_url: None,
            admin_emails: admins.to_string(),
        }
    }

    #[test]
    fn test_is_admin_case_insensitive() {
        let settings = settings_with_admins("Ops@Elite.example, dispatch@elite.example");
        assert!(settings.is_admin("ops@elite.example"));
        assert!(settings.is_admin("  DISPATCH@ELITE.EXAMPLE "));
        assert!(!settings.is_admin("rider@elite.example"));
    }

    #[test]
    fn test_is_admin_empty_list() {
        let settings = settings_with_admins("");
        assert!(!settings.is_admin("ops@elite.example"));
        assert!(!settings.is_admin(""));
    }
}
