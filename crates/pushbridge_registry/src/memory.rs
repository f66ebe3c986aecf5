//! In-memory registry backend.
//!
//! Three logical tables behind one `RwLock`: devices keyed by device id,
//! subscriptions keyed by name, and the (device, subscription) link set.
//! BTree containers keep listing order deterministic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use pushbridge_common::models::{Device, DeviceInfo, DeviceSubscriptionInfo, SubscriptionInfo};
use pushbridge_common::{BoxFuture, DeviceType};

use crate::error::RegistryError;
use crate::registry::{RegisterOutcome, Registry};

#[derive(Default)]
struct Tables {
    devices: BTreeMap<String, Device>,
    subscriptions: BTreeMap<String, String>,
    links: BTreeSet<(String, String)>,
}

/// Registry backend holding all state in process memory.
#[derive(Default)]
pub struct InMemoryRegistry {
    tables: RwLock<Tables>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for InMemoryRegistry {
    fn register_device<'a>(
        &'a self,
        device_type: DeviceType,
        device_id: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<RegisterOutcome, RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            match tables.devices.get_mut(device_id) {
                Some(existing) if existing.device_type == device_type => {
                    existing.address = address.to_string();
                    existing.updated_at = Utc::now();
                    debug!(device_id, "updated device address");
                    Ok(RegisterOutcome::AddressUpdated)
                }
                _ => {
                    tables.devices.insert(
                        device_id.to_string(),
                        Device::new(device_type, device_id, address),
                    );
                    debug!(device_id, %device_type, "registered device");
                    Ok(RegisterOutcome::Registered)
                }
            }
        })
    }

    fn unregister_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if !tables.devices.contains_key(device_id) {
                return Err(RegistryError::DeviceNotFound(device_id.to_string()));
            }
            // Links first, then the device row, so a reader never sees a
            // link pointing at a missing device.
            tables.links.retain(|(dev, _)| dev != device_id);
            tables.devices.remove(device_id);
            debug!(device_id, "unregistered device");
            Ok(())
        })
    }

    fn is_device_registered<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, RegistryError>> {
        Box::pin(async move { Ok(self.tables.read().await.devices.contains_key(device_id)) })
    }

    fn create_subscription<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            // Duplicate create is success; the description is not
            // overwritten so re-creation cannot clobber an admin edit.
            tables
                .subscriptions
                .entry(name.to_string())
                .or_insert_with(|| description.to_string());
            Ok(())
        })
    }

    fn delete_subscription<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if tables.subscriptions.remove(name).is_none() {
                return Err(RegistryError::SubscriptionNotFound(name.to_string()));
            }
            tables.links.retain(|(_, sub)| sub != name);
            debug!(subscription = name, "deleted subscription");
            Ok(())
        })
    }

    fn is_subscription_registered<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, RegistryError>> {
        Box::pin(async move { Ok(self.tables.read().await.subscriptions.contains_key(name)) })
    }

    fn list_subscriptions<'a>(
        &'a self,
    ) -> BoxFuture<'a, Result<Vec<SubscriptionInfo>, RegistryError>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .subscriptions
                .iter()
                .map(|(name, description)| SubscriptionInfo {
                    name: name.clone(),
                    description: description.clone(),
                })
                .collect())
        })
    }

    fn add_device_subscription<'a>(
        &'a self,
        device_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if !tables.devices.contains_key(device_id) {
                return Err(RegistryError::DeviceNotFound(device_id.to_string()));
            }
            if !tables.subscriptions.contains_key(name) {
                return Err(RegistryError::SubscriptionNotFound(name.to_string()));
            }
            tables
                .links
                .insert((device_id.to_string(), name.to_string()));
            Ok(())
        })
    }

    fn delete_device_subscription<'a>(
        &'a self,
        device_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if !tables.devices.contains_key(device_id) {
                return Err(RegistryError::DeviceNotFound(device_id.to_string()));
            }
            if !tables.subscriptions.contains_key(name) {
                return Err(RegistryError::SubscriptionNotFound(name.to_string()));
            }
            if !tables
                .links
                .remove(&(device_id.to_string(), name.to_string()))
            {
                return Err(RegistryError::NotSubscribed {
                    device_id: device_id.to_string(),
                    subscription: name.to_string(),
                });
            }
            Ok(())
        })
    }

    fn delete_device_subscriptions<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            tables.links.retain(|(dev, _)| dev != device_id);
            Ok(())
        })
    }

    fn devices_for_subscription_and_type<'a>(
        &'a self,
        name: &'a str,
        device_type: DeviceType,
    ) -> BoxFuture<'a, Result<Vec<Device>, RegistryError>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .links
                .iter()
                .filter(|(_, sub)| sub == name)
                .filter_map(|(dev, _)| tables.devices.get(dev))
                .filter(|device| device.device_type == device_type)
                .cloned()
                .collect())
        })
    }

    fn devices_for_subscription<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DeviceInfo>, RegistryError>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            if !tables.subscriptions.contains_key(name) {
                return Err(RegistryError::SubscriptionNotFound(name.to_string()));
            }
            Ok(tables
                .links
                .iter()
                .filter(|(_, sub)| sub == name)
                .filter_map(|(dev, _)| tables.devices.get(dev))
                .map(|device| DeviceInfo {
                    device_id: device.device_id.clone(),
                    device_type: device.device_type,
                    device_uri: device.address.clone(),
                })
                .collect())
        })
    }

    fn subscriptions_for_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DeviceSubscriptionInfo>, RegistryError>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            if !tables.devices.contains_key(device_id) {
                return Err(RegistryError::DeviceNotFound(device_id.to_string()));
            }
            Ok(tables
                .subscriptions
                .iter()
                .map(|(name, description)| DeviceSubscriptionInfo {
                    name: name.clone(),
                    description: description.clone(),
                    is_subscribed: tables
                        .links
                        .contains(&(device_id.to_string(), name.clone())),
                })
                .collect())
        })
    }
}
