//! Router assembly.
//!
//! Device-facing endpoints (registration and opt-in/opt-out) are open;
//! everything administrative sits behind the Basic-auth middleware.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::auth::require_admin;
use crate::handlers::{
    add_device_subscription, create_subscription, delete_subscription, device_subscriptions,
    enqueue_message, list_subscriptions, register_device, remove_device_subscription,
    subscription_devices, unregister_device,
};

pub fn routes(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/unregister/{device_id}", post(unregister_device))
        .route("/subs", get(list_subscriptions))
        .route("/sub/create/{name}", post(create_subscription))
        .route("/sub/delete/{name}", post(delete_subscription))
        .route("/sub/{name}", get(subscription_devices))
        .route("/message/{kind}/{name}", post(enqueue_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    let device_facing = Router::new()
        .route("/register/{device_id}", post(register_device))
        .route("/subs/{device_id}", get(device_subscriptions))
        .route("/sub/add/{name}/{device_id}", post(add_device_subscription))
        .route(
            "/sub/delete/{name}/{device_id}",
            post(remove_device_subscription),
        );

    Router::new()
        .merge(admin)
        .merge(device_facing)
        .with_state(state)
}
