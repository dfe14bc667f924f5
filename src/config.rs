use anyhow::{Context, Result};

pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

pub struct DatabaseConfig {
    pub url: String,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub fn load() -> Result<Config> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .context("PORT must be a valid port number")?;

    Ok(Config {
        database: DatabaseConfig { url },
        server: ServerConfig { host, port },
    })
}
