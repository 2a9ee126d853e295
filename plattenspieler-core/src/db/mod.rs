use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::SpotifyCredentials;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Represents a type that can store plattenspieler data.
///
/// Equality-filtered read-then-write is not assumed atomic here, so
/// uniqueness-sensitive operations (`create_account`, `create_device`,
/// `upsert_chip_record`) must be atomic within the implementation.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn account_by_id(&self, account_id: PrimaryKey) -> Result<AccountData>;
    async fn account_by_name(&self, name: &str) -> Result<AccountData>;
    /// Grants the admin flag when the store holds no admin yet. The grant
    /// must be atomic with the insert, so two concurrent first
    /// registrations cannot both become the admin.
    async fn create_account(&self, new_account: NewAccount) -> Result<AccountData>;
    async fn update_account_spotify(
        &self,
        account_id: PrimaryKey,
        credentials: Option<SpotifyCredentials>,
    ) -> Result<AccountData>;
    async fn update_account_device(
        &self,
        account_id: PrimaryKey,
        device_id: Option<String>,
    ) -> Result<AccountData>;

    async fn device_by_id(&self, device_id: PrimaryKey) -> Result<DeviceData>;
    async fn device_by_secret(&self, secret: &str) -> Result<DeviceData>;
    async fn list_devices(&self) -> Result<Vec<DeviceData>>;
    async fn create_device(&self, new_device: NewDevice) -> Result<DeviceData>;
    async fn update_device_liveness(
        &self,
        device_id: PrimaryKey,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn update_device_wifi(&self, device_id: PrimaryKey, wifi: WifiCredentials)
        -> Result<()>;

    async fn chip_record(&self, account_id: PrimaryKey, chip_id: u64) -> Result<ChipRecordData>;
    async fn upsert_chip_record(&self, new_record: NewChipRecord) -> Result<ChipRecordData>;
}

#[derive(Debug)]
pub struct NewAccount {
    pub name: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewDevice {
    pub secret: String,
    /// The owner of the new device
    pub account_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewChipRecord {
    pub chip_id: u64,
    pub track_id: String,
    /// The owner of the binding
    pub account_id: PrimaryKey,
    pub image: Option<String>,
    pub title: Option<String>,
}
