use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{admin, events, health_check, registrations, tickets};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let public = Router::new()
        .route("/events", get(events::list_active_events))
        .route("/events/:id/batches", get(events::list_event_batches))
        .route("/registrations", post(registrations::register))
        .route("/my/registrations", get(registrations::my_registrations))
        .route("/verify-ticket", post(tickets::verify_ticket))
        .route("/tickets/:ticket_id", get(tickets::get_ticket))
        .route("/tickets/:ticket_id/qr", get(tickets::ticket_qr))
        .route("/tickets/:ticket_id/email", post(tickets::resend_ticket));

    let admin_routes = Router::new()
        .route(
            "/events",
            post(events::create_event).get(events::list_all_events),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:id/batches",
            post(events::create_batch).get(events::list_event_batches),
        )
        .route(
            "/batches/:id",
            put(events::update_batch).delete(events::delete_batch),
        )
        .route(
            "/events/:id/registrations",
            get(registrations::event_roster),
        )
        .route(
            "/events/:id/registrations/stream",
            get(registrations::event_roster_stream),
        )
        .route(
            "/registrations/:ticket_id",
            delete(registrations::delete_registration),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public.nest("/admin", admin_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.allowed_origins))
}
