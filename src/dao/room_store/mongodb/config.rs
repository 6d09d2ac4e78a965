use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "quiz_rooms";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Connection settings of the MongoDB room store.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the collections.
    pub database_name: String,
    /// Pings tried before a connection attempt is reported as failed.
    pub connect_attempts: u32,
}

impl MongoConfig {
    /// Parse `uri`; a blank or missing database name falls back to the default.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: db_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(DEFAULT_DB)
                .to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB` through `lookup`.
    pub async fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MongoResult<Self> {
        let uri = lookup("MONGO_URI").ok_or(MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = lookup("MONGO_DB");
        Self::from_uri(&uri, db.as_deref()).await
    }

    /// Read `MONGO_URI` and `MONGO_DB` from the environment.
    pub async fn from_env() -> MongoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok()).await
    }
}
