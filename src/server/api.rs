use crate::agent::PortfolioAgent;
use crate::cli::Args;
use crate::error::ContactError;
use crate::models::contact::{ ContactForm, ContactResponse };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ rejection::JsonRejection, State },
    response::IntoResponse,
    http::StatusCode,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use serde::Serialize;
use axum_server::tls_rustls::{ self, RustlsConfig };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

pub const CONTACT_SUCCESS_MESSAGE: &str = "Message sent successfully!";
pub const CONTACT_FAILURE_MESSAGE: &str =
    "Failed to send message. Please try again or contact me directly via email.";
pub const CONTACT_UNREADABLE_MESSAGE: &str = "Please fill in the contact form and try again.";
pub const CONTACT_THROTTLED_MESSAGE: &str = "Too many messages right now. Please try again in a minute.";

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<PortfolioAgent>,
    contact_limiter: Arc<DefaultDirectRateLimiter>,
}

pub fn router(agent: Arc<PortfolioAgent>, contact_rate_per_minute: u32) -> Router {
    let quota = Quota::per_minute(NonZeroU32::new(contact_rate_per_minute).unwrap_or(NonZeroU32::MIN));
    let app_state = AppState {
        agent,
        contact_limiter: Arc::new(RateLimiter::direct(quota)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/contact", post(contact_handler))
        .route("/api/reload-persona", get(reload_persona_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .with_state(app_state)
}

/// Binds the API listener, then serves it on a background task. Bind and
/// certificate errors surface here so startup fails instead of logging later.
pub async fn start_http_server(
    http_port: u16,
    agent: Arc<PortfolioAgent>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let service = router(agent, args.contact_rate_per_minute).into_make_service();

    let tls_paths = match (args.tls_cert_path.as_deref(), args.tls_key_path.as_deref()) {
        (Some(cert), Some(key)) if args.enable_tls => Some((cert, key)),
        _ => None,
    };

    if let Some((cert, key)) = tls_paths {
        let tls = RustlsConfig::from_pem_file(cert, key).await?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("Contact API listening on https://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = tls_rustls::from_tcp_rustls(listener, tls).serve(service).await {
                error!("Contact API (https) stopped: {}", e);
            }
        });
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Contact API listening on http://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, service).await {
                error!("Contact API stopped: {}", e);
            }
        });
    }

    Ok(())
}

fn contact_reply(status: StatusCode, success: bool, message: impl Into<String>) -> axum::response::Response {
    (status, Json(ContactResponse { success, message: message.into() })).into_response()
}

async fn contact_handler(
    State(state): State<AppState>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> impl IntoResponse {
    if state.contact_limiter.check().is_err() {
        warn!("Contact rate limit exceeded, rejecting submission");
        return contact_reply(StatusCode::TOO_MANY_REQUESTS, false, CONTACT_THROTTLED_MESSAGE);
    }

    let form = match payload {
        Ok(Json(form)) => form,
        Err(rejection) => {
            warn!("Unreadable contact submission: {}", rejection.body_text());
            return contact_reply(StatusCode::BAD_REQUEST, false, CONTACT_UNREADABLE_MESSAGE);
        }
    };

    match state.agent.submit_contact(form).await {
        Ok(()) => contact_reply(StatusCode::OK, true, CONTACT_SUCCESS_MESSAGE),
        Err(e @ ContactError::Configuration) => {
            error!("Contact submission rejected: {}", e);
            contact_reply(StatusCode::SERVICE_UNAVAILABLE, false, e.to_string())
        }
        Err(ContactError::Invalid(reason)) => contact_reply(StatusCode::BAD_REQUEST, false, reason),
        Err(e @ ContactError::Delivery(_)) => {
            error!("Contact relay failed: {}", e);
            contact_reply(StatusCode::BAD_GATEWAY, false, CONTACT_FAILURE_MESSAGE)
        }
    }
}

async fn reload_persona_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.agent.reload_persona_if_changed().await {
        Ok(true) => (StatusCode::OK, Json(ReloadResponse {
            success: true,
            message: "Persona reloaded".into(),
        })),
        Ok(false) => (StatusCode::OK, Json(ReloadResponse {
            success: true,
            message: "Persona unchanged".into(),
        })),
        Err(e) => {
            error!("Persona reload failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ReloadResponse {
                success: false,
                message: e.to_string(),
            }))
        }
    }
}
