use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::FutureExt as _;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use trigger_types::{
    ActivatedTriggerSet, Classification, EventType, PushEvent, RoutingTables, classify,
    should_ignore,
};

use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, TriggerLauncher, panic_message};
use crate::error::Rejection;
use crate::signal::ShutdownSignal;
use crate::signature;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

const PING_RESPONSE: &str = "pong";
const PUSH_RESPONSE: &str = "ok";
const PULL_REQUEST_RESPONSE: &str = "ignored";

/// Everything a request handler needs. Cloned per request; the config and
/// tables are shared read-only.
#[derive(Clone)]
pub struct AppState<L> {
    config: Arc<ServerConfig>,
    routing: Arc<RoutingTables>,
    dispatcher: Dispatcher<L>,
}

impl<L: TriggerLauncher> AppState<L> {
    pub fn new(config: ServerConfig, routing: RoutingTables, launcher: L) -> Self {
        Self {
            config: Arc::new(config),
            routing: Arc::new(routing),
            dispatcher: Dispatcher::new(launcher),
        }
    }
}

/// Build the webhook router.
///
/// Every request goes through one handler so method and path are checked in
/// a fixed order, and a panic anywhere in it becomes a 500.
pub fn router<L: TriggerLauncher>(state: AppState<L>) -> Router {
    Router::new()
        .fallback(handle_webhook::<L>)
        .with_state(state)
        .layer(middleware::from_fn(catch_panic))
}

/// Starts the webhook HTTP server and runs until `shutdown` resolves.
///
/// Detached trigger dispatches still running at that point are not awaited;
/// their child processes are killed when the runtime stops.
pub async fn serve<L, F>(
    config: ServerConfig,
    routing: RoutingTables,
    launcher: L,
    shutdown: F,
) -> std::io::Result<()>
where
    L: TriggerLauncher,
    F: Future<Output = ShutdownSignal> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        path = %config.path,
        ignore_tags = config.ignore_tags,
        signed = config.secret.is_some(),
        repositories = routing.repositories.len(),
        "Webhook server listening"
    );

    let state = AppState::new(config, routing, launcher);
    let dispatcher = state.dispatcher.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let signal = shutdown.await;
            announce_shutdown(signal, &dispatcher);
        })
        .await
}

fn announce_shutdown<L: TriggerLauncher>(signal: ShutdownSignal, dispatcher: &Dispatcher<L>) {
    match dispatcher.in_flight() {
        0 => info!(%signal, "Shutting down webhook server"),
        in_flight => warn!(
            %signal,
            in_flight,
            "Shutting down with trigger dispatches still running, their processes will be killed"
        ),
    }
}

async fn catch_panic(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(panic = %panic_message(panic.as_ref()), "Recovered from panic in webhook handler");
            Rejection::Panicked.into_response()
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[instrument(
    name = "webhook",
    skip_all,
    fields(
        event = tracing::field::Empty,
        delivery = tracing::field::Empty,
        repository = tracing::field::Empty,
    )
)]
async fn handle_webhook<L: TriggerLauncher>(
    State(state): State<AppState<L>>,
    request: Request,
) -> Result<Response, Rejection> {
    if request.method() != Method::POST {
        return Err(Rejection::MethodNotAllowed);
    }
    if request.uri().path() != state.config.path {
        return Err(Rejection::NotFound);
    }

    #[cfg(test)]
    if request.headers().contains_key(tests::FAULT_HEADER) {
        panic!("fault injected into webhook handler");
    }

    let headers = request.headers();
    let event = match classify(header(headers, EVENT_HEADER)) {
        Classification::Supported(event) => event,
        Classification::Missing => return Err(Rejection::MissingEvent),
        Classification::Unknown(name) => return Err(Rejection::UnknownEvent(name)),
    };
    let delivery = header(headers, DELIVERY_HEADER).unwrap_or("unknown");
    let signature = header(headers, SIGNATURE_HEADER)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    let span = tracing::Span::current();
    span.record("event", event.as_str());
    span.record("delivery", delivery);

    let body = axum::body::to_bytes(request.into_body(), state.config.max_body_bytes)
        .await
        .map_err(|e| Rejection::ReadBody(e.to_string()))?;

    if let Some(secret) = &state.config.secret {
        let Some(signature) = signature else {
            return Err(Rejection::MissingSignature);
        };
        if !signature::verify(secret.as_bytes(), &body, &signature) {
            return Err(Rejection::InvalidSignature);
        }
    }

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| Rejection::DecodeBody(e.to_string()))?;

    match event {
        EventType::Ping => {
            info!("Ping received");
            Ok((StatusCode::OK, PING_RESPONSE).into_response())
        }
        EventType::Push => handle_push(&state, &payload),
        EventType::PullRequest => {
            // Accepted so GitHub records a successful delivery; nothing is triggered.
            debug!("Pull request event accepted without action");
            Ok((StatusCode::OK, PULL_REQUEST_RESPONSE).into_response())
        }
    }
}

fn handle_push<L: TriggerLauncher>(
    state: &AppState<L>,
    payload: &Value,
) -> Result<Response, Rejection> {
    let push = PushEvent::from_value(payload).map_err(|_| Rejection::MissingRepositoryName)?;
    tracing::Span::current().record("repository", push.repository.as_str());
    info!(git_ref = ?push.git_ref, "Got push");

    let triggers = match push.git_ref.as_deref() {
        Some(git_ref) if !should_ignore(git_ref, state.config.ignore_tags) => {
            state.routing.activate([push.repository.as_str()])
        }
        Some(git_ref) => {
            info!(git_ref, "Ref ignored, no triggers activated");
            ActivatedTriggerSet::new()
        }
        None => {
            warn!("Push without ref, no triggers activated");
            ActivatedTriggerSet::new()
        }
    };

    if triggers.is_empty() {
        debug!("Push matched no trigger endpoints");
    } else {
        info!(
            endpoints = ?triggers.iter().collect::<Vec<_>>(),
            "Dispatching triggers"
        );
        // Outcomes are logged by the dispatcher; the response does not wait.
        state.dispatcher.spawn_detached(triggers);
    }

    Ok((StatusCode::OK, PUSH_RESPONSE).into_response())
}
