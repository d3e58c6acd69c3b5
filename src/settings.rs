use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub secret: String,
    pub max_age_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Mail {
    pub from: String,
    pub admin_address: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub postgres: Postgres,
    pub session: Session,
    pub mail: Mail,
}

impl Settings {
    /// Reads `path` if it exists, then applies environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();

        let config = Config::builder()
            .set_default("server.listen", "0.0.0.0:5000")?
            .set_default("postgres.max_connections", 10)?
            .set_default("session.secret", "spinbet-development-secret")?
            .set_default("session.max_age_secs", 60 * 60 * 24 * 7)?
            .set_default("mail.from", "SpinBet <no-reply@spinbet.local>")?
            .set_default("mail.admin_address", "admin@spinbet.local")?
            .set_default("mail.smtp_host", "smtp.gmail.com")?
            .set_default("mail.smtp_port", 465)?
            .add_source(File::with_name(path).required(false))
            .set_override_option("postgres.url", env("DATABASE_URL"))?
            .set_override_option("session.secret", env("SESSION_SECRET"))?
            .set_override_option("mail.smtp_host", env("SMTP_HOST"))?
            .set_override_option("mail.smtp_port", env("SMTP_PORT"))?
            .set_override_option("mail.smtp_user", env("SMTP_USER"))?
            .set_override_option("mail.smtp_pass", env("SMTP_PASS"))?
            .build()?;

        config.try_deserialize()
    }
}
