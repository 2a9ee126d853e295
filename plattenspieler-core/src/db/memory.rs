use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{
    AccountData, ChipRecordData, Database, DatabaseError, DeviceData, NewAccount, NewChipRecord,
    NewDevice, PrimaryKey, Result, SpotifyCredentials, WifiCredentials,
};

/// The in-memory store implementation.
///
/// Uniqueness checks (account name, device secret, chip binding) take the
/// `unique` mutex so two concurrent inserts cannot both pass the check.
/// The mutex is never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    accounts: DashMap<PrimaryKey, AccountData>,
    devices: DashMap<PrimaryKey, DeviceData>,
    chips: DashMap<PrimaryKey, ChipRecordData>,

    next_id: AtomicI32,
    unique: Mutex<()>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    fn assign_id(&self) -> PrimaryKey {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn account_entry(&self, account_id: PrimaryKey) -> Result<AccountData> {
        self.accounts
            .get(&account_id)
            .map(|a| a.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "account",
                identifier: "id",
            })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn account_by_id(&self, account_id: PrimaryKey) -> Result<AccountData> {
        self.account_entry(account_id)
    }

    async fn account_by_name(&self, name: &str) -> Result<AccountData> {
        self.accounts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "account",
                identifier: "name",
            })
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<AccountData> {
        let _guard = self.unique.lock();

        if self.accounts.iter().any(|a| a.name == new_account.name) {
            return Err(DatabaseError::Conflict {
                resource: "account",
                field: "name",
                value: new_account.name,
            });
        }

        // The admin grant shares the guard with the insert, so only one
        // account can ever observe an admin-less store.
        let admin = !self.accounts.iter().any(|a| a.admin);

        let account = AccountData {
            id: self.assign_id(),
            name: new_account.name,
            password: new_account.password,
            picture: None,
            admin,
            spotify: None,
            device_id: None,
        };

        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_account_spotify(
        &self,
        account_id: PrimaryKey,
        credentials: Option<SpotifyCredentials>,
    ) -> Result<AccountData> {
        let mut account = self.accounts.get_mut(&account_id).ok_or(DatabaseError::NotFound {
            resource: "account",
            identifier: "id",
        })?;

        account.spotify = credentials;
        Ok(account.clone())
    }

    async fn update_account_device(
        &self,
        account_id: PrimaryKey,
        device_id: Option<String>,
    ) -> Result<AccountData> {
        let mut account = self.accounts.get_mut(&account_id).ok_or(DatabaseError::NotFound {
            resource: "account",
            identifier: "id",
        })?;

        account.device_id = device_id;
        Ok(account.clone())
    }

    async fn device_by_id(&self, device_id: PrimaryKey) -> Result<DeviceData> {
        self.devices
            .get(&device_id)
            .map(|d| d.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "device",
                identifier: "id",
            })
    }

    async fn device_by_secret(&self, secret: &str) -> Result<DeviceData> {
        self.devices
            .iter()
            .find(|d| d.secret == secret)
            .map(|d| d.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "device",
                identifier: "secret",
            })
    }

    async fn list_devices(&self) -> Result<Vec<DeviceData>> {
        Ok(self.devices.iter().map(|d| d.clone()).collect())
    }

    async fn create_device(&self, new_device: NewDevice) -> Result<DeviceData> {
        let _guard = self.unique.lock();

        if self.devices.iter().any(|d| d.secret == new_device.secret) {
            return Err(DatabaseError::Conflict {
                resource: "device",
                field: "secret",
                value: new_device.secret,
            });
        }

        let device = DeviceData {
            id: self.assign_id(),
            secret: new_device.secret,
            account_id: new_device.account_id,
            last_active: None,
            wifi: None,
        };

        self.devices.insert(device.id, device.clone());
        Ok(device)
    }

    async fn update_device_liveness(
        &self,
        device_id: PrimaryKey,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut device = self.devices.get_mut(&device_id).ok_or(DatabaseError::NotFound {
            resource: "device",
            identifier: "id",
        })?;

        device.last_active = Some(at);
        Ok(())
    }

    async fn update_device_wifi(
        &self,
        device_id: PrimaryKey,
        wifi: WifiCredentials,
    ) -> Result<()> {
        let mut device = self.devices.get_mut(&device_id).ok_or(DatabaseError::NotFound {
            resource: "device",
            identifier: "id",
        })?;

        device.wifi = Some(wifi);
        Ok(())
    }

    async fn chip_record(&self, account_id: PrimaryKey, chip_id: u64) -> Result<ChipRecordData> {
        self.chips
            .iter()
            .find(|c| c.account_id == account_id && c.chip_id == chip_id)
            .map(|c| c.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "chip record",
                identifier: "chip_id",
            })
    }

    async fn upsert_chip_record(&self, new_record: NewChipRecord) -> Result<ChipRecordData> {
        let _guard = self.unique.lock();

        let existing = self
            .chips
            .iter()
            .find(|c| c.account_id == new_record.account_id && c.chip_id == new_record.chip_id)
            .map(|c| c.id);

        let id = existing.unwrap_or_else(|| self.assign_id());

        let record = ChipRecordData {
            id,
            chip_id: new_record.chip_id,
            track_id: new_record.track_id,
            account_id: new_record.account_id,
            image: new_record.image,
            title: new_record.title,
        };

        self.chips.insert(id, record.clone());
        Ok(record)
    }
}
