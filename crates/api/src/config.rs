use std::{env, fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
  Development,
  Production,
}

impl fmt::Display for Environment {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Environment::Development => write!(f, "development"),
      Environment::Production => write!(f, "production"),
    }
  }
}

impl FromStr for Environment {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "development" | "dev" => Ok(Environment::Development),
      "production" | "prod" => Ok(Environment::Production),
      _ => Err(format!("'{}' is not a valid environment", s)),
    }
  }
}

/// Runtime settings of the api server, read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
  pub host: String,
  pub port: u16,
  pub database_url: String,
  pub jwt_secret: String,
  /// Token lifetime in minutes.
  pub jwt_maxage: i64,
  pub cors_origin: String,
  pub environment: Environment,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let port = required("PORT")?;
    let jwt_maxage = required("JWT_MAXAGE")?;

    Ok(Self {
      host: required("HOST")?,
      port: port.parse().with_context(|| format!("PORT `{port}` is not a valid port"))?,
      database_url: required("DATABASE_URL")?,
      jwt_secret: required("JWT_SECRET")?,
      jwt_maxage: jwt_maxage
        .parse()
        .with_context(|| format!("JWT_MAXAGE `{jwt_maxage}` is not a number of minutes"))?,
      cors_origin: env::var("CORS_ORIGIN").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string()),
      environment: match env::var("APP_ENV") {
        Ok(value) => value.parse().map_err(|e: String| anyhow!(e))?,
        Err(_) => Environment::Production,
      },
    })
  }

  pub fn server_url(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

fn required(name: &str) -> Result<String> {
  env::var(name).with_context(|| format!("{name} is not set in .env file"))
}
