//! HTTP and WebSocket surface of the relay.
//!
//! - `GET /ws`: WebSocket bridged to the [`RelayHub`]
//! - `GET /stats`: hub activity
//! - marketplace routes, answering errors with a generic `{err}` body after
//!   logging the detailed cause

use crate::config::ServerConfig;
use crate::hub::RelayHub;
use crate::marketplace::{Marketplace, MarketplaceError, PublishRequest, UnpublishRequest};
use crate::protocol::ClientFrame;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct AppContext {
    hub: RelayHub,
    marketplace: Marketplace,
}

pub struct RelayServer {
    config: ServerConfig,
    hub: RelayHub,
    marketplace: Marketplace,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            hub: RelayHub::new(),
            marketplace: Marketplace::new(),
        }
    }

    pub fn hub(&self) -> &RelayHub {
        &self.hub
    }

    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    pub fn router(&self) -> Router {
        let context = AppContext {
            hub: self.hub.clone(),
            marketplace: self.marketplace.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/stats", get(stats_handler))
            .route("/getMarketplaceProjects", get(list_projects))
            .route("/publishProject", post(publish_project))
            .route("/unpublishProject", patch(unpublish_project))
            .route("/cloneProject/:doc_id", get(clone_project))
            .with_state(context)
            .layer(self.cors_layer())
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.config.allowed_origins;
        let allow_origin = if origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(
                origins
                    .iter()
                    .filter_map(|origin| HeaderValue::from_str(origin).ok()),
            )
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Bind the configured address and serve until the process exits
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve_with_listener(listener).await
    }

    pub async fn serve_with_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("Relay server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(context): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, context.hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let (mut sink, mut stream) = socket.split();
    let (client_id, mut member_rx) = hub.attach();

    let writer = tokio::spawn(async move {
        while let Some(frame) = member_rx.recv().await {
            let text = match frame.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!(%client_id, error = %e, "dropping unencodable frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientFrame::decode(&text) {
                Ok(frame) => hub.handle(client_id, frame),
                Err(e) => warn!(%client_id, error = %e, "dropping malformed frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(%client_id, error = %e, "socket error");
                break;
            }
        }
    }

    hub.detach(client_id);
    writer.abort();
}

async fn stats_handler(State(context): State<AppContext>) -> Json<serde_json::Value> {
    let stats = context.hub.stats();
    Json(serde_json::json!({
        "activeConnections": stats.active_connections,
        "activeRooms": stats.active_rooms,
        "messagesRelayed": stats.messages_relayed,
    }))
}

/// Marketplace failure: logged in full, answered generically
struct ApiError {
    operation: &'static str,
    cause: MarketplaceError,
}

impl ApiError {
    fn during(operation: &'static str) -> impl FnOnce(MarketplaceError) -> Self {
        move |cause| Self { operation, cause }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(operation = self.operation, error = %self.cause, "marketplace request failed");

        let status = match self.cause {
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MarketplaceError::OwnershipMismatch => StatusCode::FORBIDDEN,
        };
        let body = serde_json::json!({
            "err": format!("Error in marketplace.{}, check server logs for details", self.operation),
        });
        (status, Json(body)).into_response()
    }
}

/// Session user from the `ssid` cookie
fn session_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "ssid")
        .map(|(_, value)| value.to_string())
}

async fn list_projects(State(context): State<AppContext>) -> impl IntoResponse {
    Json(context.marketplace.get_published_projects().await)
}

async fn publish_project(
    State(context): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = session_user(&headers);
    let document = context
        .marketplace
        .publish_project(request, user.as_deref())
        .await
        .map_err(ApiError::during("publish_project"))?;
    Ok(Json(document))
}

async fn unpublish_project(
    State(context): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<UnpublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = session_user(&headers);
    let document = context
        .marketplace
        .unpublish_project(request.id, &request.user_id, user.as_deref())
        .await
        .map_err(ApiError::during("unpublish_project"))?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
struct CloneQuery {
    username: String,
}

async fn clone_project(
    State(context): State<AppContext>,
    headers: HeaderMap,
    Path(doc_id): Path<Uuid>,
    Query(query): Query<CloneQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = session_user(&headers);
    let document = context
        .marketplace
        .clone_project(doc_id, user.as_deref(), &query.username)
        .await
        .map_err(ApiError::during("clone_project"))?;
    Ok(Json(document))
}
