use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Signing secret used when `JWT_SECRET` is unset. Only fit for the in-memory store.
pub const DEV_JWT_SECRET: &str = "pingbook-development-secret";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Database {
    /// Postgres connection string. Empty selects the in-memory store.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Jwt {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Google {
    pub id: String,
    pub secret: String,
    pub redirect: String,
}

impl Google {
    pub fn is_configured(&self) -> bool {
        !self.id.is_empty() && !self.secret.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Sendgrid {
    pub key: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Frontend {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    pub database: Database,
    pub jwt: Jwt,
    pub google: Google,
    pub sendgrid: Sendgrid,
    pub frontend: Frontend,
    pub server: Server,
    pub log: Log,
}

impl Settings {
    /// Defaults, then `config.toml` if present, then the environment
    /// (`JWT_SECRET` sets `jwt.secret`).
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database.url", "")?
            .set_default("jwt.secret", DEV_JWT_SECRET)?
            .set_default("google.id", "")?
            .set_default("google.secret", "")?
            .set_default(
                "google.redirect",
                "http://localhost:8080/api/auth/google/callback",
            )?
            .set_default("sendgrid.key", "")?
            .set_default("sendgrid.from", "no-reply@pingbook.app")?
            .set_default("frontend.url", "http://localhost:3000")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("log.level", "info")?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().separator("_"))
            .build()?;

        config.try_deserialize()
    }

    /// Whether tokens would be signed with a blank or publicly known secret.
    pub fn uses_default_secret(&self) -> bool {
        let secret = self.jwt.secret.trim();
        secret.is_empty() || secret == DEV_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::set_var;

    #[test]
    fn test_settings() {
        set_var("JWT_SECRET", "from-env");
        set_var("GOOGLE_ID", "client-id");
        let settings = Settings::new().unwrap_or_default();
        assert_eq!(settings.jwt.secret, "from-env");
        assert_eq!(settings.google.id, "client-id");
        assert_eq!(settings.frontend.url, "http://localhost:3000");
        assert!(!settings.uses_default_secret());
    }

    #[test]
    fn test_default_secret_detected() {
        let mut settings = Settings::default();
        assert!(settings.uses_default_secret());
        settings.jwt.secret = DEV_JWT_SECRET.into();
        assert!(settings.uses_default_secret());
        settings.jwt.secret = "a-real-secret".into();
        assert!(!settings.uses_default_secret());
    }
}
