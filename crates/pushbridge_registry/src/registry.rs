//! The registry contract.
//!
//! Object-safe so it can be shared as `Arc<dyn Registry>` between the
//! axum state and the worker; methods return boxed futures in the same
//! style as the service traits in `pushbridge_common`.

use std::sync::Arc;

use pushbridge_common::models::{Device, DeviceInfo, DeviceSubscriptionInfo, SubscriptionInfo};
use pushbridge_common::{BoxFuture, DeviceType};

use crate::error::RegistryError;

/// What `register_device` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new device row was inserted
    Registered,
    /// The (id, type) pair already existed; only the address was updated.
    /// Routine for WP7, whose channel URIs churn.
    AddressUpdated,
}

/// Persistent store of devices, subscriptions, and memberships.
///
/// Cascading is contract-enforced: `unregister_device` and
/// `delete_subscription` remove the membership links themselves, so no
/// `DeviceSubscription` can ever reference a deleted row.
pub trait Registry: Send + Sync {
    /// Idempotent upsert keyed on (device_id, device_type).
    fn register_device<'a>(
        &'a self,
        device_type: DeviceType,
        device_id: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<RegisterOutcome, RegistryError>>;

    /// Deletes the device's subscription links, then the device itself.
    fn unregister_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    fn is_device_registered<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, RegistryError>>;

    /// Idempotent: creating an existing subscription is success.
    fn create_subscription<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    /// Deletes the topic's device links, then the subscription record.
    fn delete_subscription<'a>(&'a self, name: &'a str)
        -> BoxFuture<'a, Result<(), RegistryError>>;

    fn is_subscription_registered<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, RegistryError>>;

    fn list_subscriptions<'a>(
        &'a self,
    ) -> BoxFuture<'a, Result<Vec<SubscriptionInfo>, RegistryError>>;

    /// Validates both ends exist; inserting an existing link is a no-op.
    fn add_device_subscription<'a>(
        &'a self,
        device_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    fn delete_device_subscription<'a>(
        &'a self,
        device_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    /// Removes every link for the device, leaving the device registered.
    /// Used by stateless providers when an endpoint is permanently gone.
    fn delete_device_subscriptions<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>>;

    /// The fan-out read path: devices of one provider's type within a
    /// topic. Empty when nothing matches, never an error.
    fn devices_for_subscription_and_type<'a>(
        &'a self,
        name: &'a str,
        device_type: DeviceType,
    ) -> BoxFuture<'a, Result<Vec<Device>, RegistryError>>;

    /// Administrative listing of every device in a topic.
    fn devices_for_subscription<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DeviceInfo>, RegistryError>>;

    /// Every subscription in the system, flagged with whether the device
    /// has opted in.
    fn subscriptions_for_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DeviceSubscriptionInfo>, RegistryError>>;
}

/// The registry as shared by the backend, dispatcher, and MPNS pruning.
pub type SharedRegistry = Arc<dyn Registry>;
