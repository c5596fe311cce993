use std::env;
use std::time::Duration;

use crate::features::contacts::models::CsvSchema;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    /// Present only when the postgres store backend is selected
    pub database: Option<DatabaseConfig>,
    pub auth: AuthConfig,
    pub contacts: ContactsConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 shared secret used to verify bearer tokens
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub jwt_leeway: Duration,
}

/// Which backend holds contact batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ContactsConfig {
    /// Header names an upload must carry, resolved once at startup
    pub schema: CsvSchema,
    pub max_upload_size: usize,
    pub store_backend: StoreBackend,
    pub ingestion_queue_size: usize,
    pub ingestion_max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let contacts = ContactsConfig::from_env()?;
        let database = match contacts.store_backend {
            StoreBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StoreBackend::Memory => None,
        };

        Ok(Config {
            app: AppConfig::from_env()?,
            database,
            auth: AuthConfig::from_env()?,
            contacts,
            swagger: SwaggerConfig::from_env(),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let cors_allowed_origins = split_list(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set when CONTACTS_STORE=postgres".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_var(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_var("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_var("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("AUTH_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "AUTH_JWT_SECRET environment variable is required".to_string())?;

        let issuer = env::var("AUTH_ISSUER").ok().filter(|s| !s.is_empty());
        let audience = env::var("AUTH_AUDIENCE").ok().filter(|s| !s.is_empty());
        let jwt_leeway_secs = parse_var("AUTH_JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            jwt_secret,
            issuer,
            audience,
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl ContactsConfig {
    const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024; // 10MB
    const DEFAULT_INGESTION_QUEUE_SIZE: usize = 1000;
    const DEFAULT_INGESTION_MAX_CONCURRENT: usize = 4;

    pub fn from_env() -> Result<Self, String> {
        let schema = match env::var("CSV_REQUIRED_HEADERS") {
            Ok(raw) => CsvSchema::from_header_names(split_list(&raw))?,
            Err(_) => CsvSchema::default(),
        };

        let store_backend = match env::var("CONTACTS_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(format!(
                    "CONTACTS_STORE must be 'postgres' or 'memory', got '{}'",
                    other
                ))
            }
        };

        Ok(Self {
            schema,
            max_upload_size: parse_var("CONTACTS_MAX_UPLOAD_SIZE", Self::DEFAULT_MAX_UPLOAD_SIZE)?,
            store_backend,
            ingestion_queue_size: parse_var(
                "INGESTION_QUEUE_SIZE",
                Self::DEFAULT_INGESTION_QUEUE_SIZE,
            )?
            .max(1),
            ingestion_max_concurrent: parse_var(
                "INGESTION_MAX_CONCURRENT",
                Self::DEFAULT_INGESTION_MAX_CONCURRENT,
            )?
            .max(1),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Self {
        Self {
            title: env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Contacts API".to_string()),
            version: env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string()),
            description: env::var("SWAGGER_DESCRIPTION")
                .unwrap_or_else(|_| "Contact CSV ingestion and retrieval".to_string()),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr + ToString,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|_| format!("{} must be a valid number", name))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
