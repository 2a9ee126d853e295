use std::sync::Arc;

use chrono::Utc;
use log::info;
use thiserror::Error;

use crate::{
    Config, Database, DatabaseError, DeviceData, NewDevice, PrimaryKey, WifiCredentials,
};

/// Separates the version tag from the payload in a firmware response.
pub const FIRMWARE_DELIMITER: &str = "/=====/";

/// Manages device identity, liveness, and firmware negotiation.
pub struct DeviceRegistry<Db> {
    db: Arc<Db>,
    config: Arc<Config>,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Another device already uses this secret
    #[error("Device secret is already in use")]
    SecretTaken,
    /// The device exists but belongs to a different account
    #[error("Device does not belong to this account")]
    NotOwner,
    #[error("Device does not exist")]
    NotFound,
    #[error(transparent)]
    Db(DatabaseError),
}

impl<Db> DeviceRegistry<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>, config: &Arc<Config>) -> Self {
        Self {
            db: db.clone(),
            config: config.clone(),
        }
    }

    /// Registers a new device owned by the given account. Multiple devices
    /// per account are fine, two devices sharing a secret are not.
    pub async fn register(
        &self,
        account_id: PrimaryKey,
        secret: String,
    ) -> Result<DeviceData, DeviceError> {
        let device = self
            .db
            .create_device(NewDevice { secret, account_id })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { .. } => DeviceError::SecretTaken,
                e => DeviceError::Db(e),
            })?;

        info!("Device {} registered for account {}.", device.id, account_id);
        Ok(device)
    }

    /// Bumps the liveness timestamp. Called on every device-authenticated
    /// request.
    pub async fn record_activity(&self, device_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.db.update_device_liveness(device_id, Utc::now()).await
    }

    /// Negotiates a firmware update against the canonical version.
    /// Returns [None] when the device is already up to date, otherwise the
    /// version tag and full payload joined by [FIRMWARE_DELIMITER].
    pub fn firmware(&self, reported_version: &str) -> Option<String> {
        let firmware = &self.config.firmware;

        if reported_version == firmware.version {
            return None;
        }

        Some(format!(
            "{}{}{}",
            firmware.version, FIRMWARE_DELIMITER, firmware.payload
        ))
    }

    /// Stores new wifi credentials on a device, if the caller owns it.
    pub async fn update_wifi(
        &self,
        caller: PrimaryKey,
        device_id: PrimaryKey,
        wifi: WifiCredentials,
    ) -> Result<(), DeviceError> {
        let device = self.db.device_by_id(device_id).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => DeviceError::NotFound,
            e => DeviceError::Db(e),
        })?;

        if device.account_id != caller {
            return Err(DeviceError::NotOwner);
        }

        self.db
            .update_device_wifi(device_id, wifi)
            .await
            .map_err(DeviceError::Db)
    }

    /// Lists every registered device, for the admin inventory.
    pub async fn list_all(&self) -> Result<Vec<DeviceData>, DatabaseError> {
        self.db.list_devices().await
    }
}
