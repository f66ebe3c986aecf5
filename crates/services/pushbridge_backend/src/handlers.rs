//! Route handlers for the registration, subscription, and message
//! endpoints.
//!
//! Handlers only validate input and talk to the registry or the queue;
//! delivery happens later in the worker, so a 200 from `/message/...`
//! means "queued", not "delivered".

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use pushbridge_common::models::{validate_ios_device_id, validate_wp7_address};
use pushbridge_common::{DeviceType, PushError, PushMessage, PushMessageBody};
use pushbridge_queue::DeliveryQueue;
use pushbridge_registry::{RegisterOutcome, Registry};

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct RegisterParams {
    #[serde(rename = "type")]
    pub device_type: String,
    pub uri: Option<String>,
}

pub async fn register_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(params): Query<RegisterParams>,
) -> Result<Json<Value>, PushError> {
    let device_type: DeviceType = params.device_type.parse()?;
    let address = match device_type {
        DeviceType::Ios => {
            validate_ios_device_id(&device_id)?;
            String::new()
        }
        DeviceType::Android => String::new(),
        DeviceType::Wp7 => {
            let uri = params.uri.ok_or_else(|| {
                PushError::InvalidFormat("WP7 registration requires a channel uri".to_string())
            })?;
            validate_wp7_address(&uri)?;
            uri
        }
    };

    let outcome = state
        .registry
        .register_device(device_type, &device_id, &address)
        .await?;
    info!(device_id = %device_id, device_type = %device_type, "device registered");

    let status = match outcome {
        RegisterOutcome::Registered => "registered",
        RegisterOutcome::AddressUpdated => "updated",
    };
    Ok(Json(json!({ "status": status })))
}

pub async fn unregister_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, PushError> {
    state.registry.unregister_device(&device_id).await?;
    info!(device_id = %device_id, "device unregistered");
    Ok(Json(json!({ "status": "unregistered" })))
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, PushError> {
    let subs = state.registry.list_subscriptions().await?;
    Ok(Json(json!({ "subscriptions": subs })))
}

#[derive(Deserialize)]
pub struct CreateSubscriptionParams {
    #[serde(default)]
    pub desc: String,
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<CreateSubscriptionParams>,
) -> Result<Json<Value>, PushError> {
    state
        .registry
        .create_subscription(&name, &params.desc)
        .await?;
    info!(subscription = %name, "subscription created");
    Ok(Json(json!({ "status": "created" })))
}

pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, PushError> {
    state.registry.delete_subscription(&name).await?;
    info!(subscription = %name, "subscription deleted");
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn subscription_devices(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, PushError> {
    let devices = state.registry.devices_for_subscription(&name).await?;
    Ok(Json(json!({ "devices": devices })))
}

pub async fn device_subscriptions(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, PushError> {
    let subs = state.registry.subscriptions_for_device(&device_id).await?;
    Ok(Json(json!({ "subscriptions": subs })))
}

pub async fn add_device_subscription(
    State(state): State<Arc<AppState>>,
    Path((name, device_id)): Path<(String, String)>,
) -> Result<Json<Value>, PushError> {
    state
        .registry
        .add_device_subscription(&device_id, &name)
        .await?;
    Ok(Json(json!({ "status": "subscribed" })))
}

pub async fn remove_device_subscription(
    State(state): State<Arc<AppState>>,
    Path((name, device_id)): Path<(String, String)>,
) -> Result<Json<Value>, PushError> {
    state
        .registry
        .delete_device_subscription(&device_id, &name)
        .await?;
    Ok(Json(json!({ "status": "unsubscribed" })))
}

#[derive(Deserialize)]
pub struct MessageParams {
    pub mesg: Option<String>,
    pub count: Option<String>,
    pub img: Option<String>,
    pub alert: Option<String>,
    pub sound: Option<String>,
}

pub async fn enqueue_message(
    State(state): State<Arc<AppState>>,
    Path((kind, name)): Path<(String, String)>,
    Query(params): Query<MessageParams>,
) -> Result<Json<Value>, PushError> {
    if !state.registry.is_subscription_registered(&name).await? {
        return Err(PushError::NotFound(format!("subscription {name}")));
    }

    let body = build_message_body(&kind, params)?;
    let msg = PushMessage::new(&name, body);
    state.queue.enqueue(&msg).await?;
    info!(subscription = %name, kind = %kind, "message queued");
    Ok(Json(json!({ "status": "queued" })))
}

fn build_message_body(kind: &str, params: MessageParams) -> Result<PushMessageBody, PushError> {
    match kind {
        "toast" => Ok(PushMessageBody::Toast {
            text: require(params.mesg, "mesg")?,
        }),
        "raw" => Ok(PushMessageBody::Raw {
            data: require(params.mesg, "mesg")?,
        }),
        "tile" => Ok(PushMessageBody::Tile {
            title: require(params.mesg, "mesg")?,
            count: parse_count(params.count)?,
            image: params.img.unwrap_or_default(),
        }),
        "iOS" => Ok(PushMessageBody::Iphone {
            alert: require(params.alert.or(params.mesg), "alert")?,
            badge: parse_count(params.count)?,
            sound: params.sound.unwrap_or_default(),
        }),
        "common" => Ok(PushMessageBody::Common {
            title: require(params.mesg, "mesg")?,
            count: parse_count(params.count)?,
            image: params.img.unwrap_or_default(),
            sound: params.sound.unwrap_or_default(),
        }),
        other => Err(PushError::InvalidFormat(format!(
            "unknown message kind: {other}"
        ))),
    }
}

fn require(value: Option<String>, field: &str) -> Result<String, PushError> {
    value.ok_or_else(|| PushError::InvalidFormat(format!("missing query parameter: {field}")))
}

fn parse_count(value: Option<String>) -> Result<u32, PushError> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| PushError::InvalidFormat(format!("count is not an integer: {raw}"))),
    }
}
