mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
use error::MongoDaoError;
pub use store::MongoRoomStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::RoomNotFound { code } => {
                StorageError::NotFound(format!("room `{code}` not found"))
            }
            MongoDaoError::PlayerNotFound { id } => {
                StorageError::NotFound(format!("player `{id}` not found"))
            }
            MongoDaoError::DuplicateKey { what } => StorageError::Conflict(what),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
