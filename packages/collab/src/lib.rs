//! # ReacType Collab
//!
//! Room-based state sharing between ReacType editors.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   custom-event    ┌──────────────┐   receive message   ┌──────────────┐
//! │ editor A     │ ────────────────→ │ relay hub    │ ──────────────────→ │ editor B     │
//! │ store ⇄ relay│ ←──────────────── │ rooms, state │ ←────────────────── │ relay ⇄ store│
//! └──────────────┘ room-state-update └──────────────┘      custom-event   └──────────────┘
//! ```
//!
//! Each joined editor runs a [`ChangeRelay`]:
//!
//! - **Outbound**: store changes are debounced and the whole shared state is
//!   broadcast once the burst settles
//! - **Inbound**: peer broadcasts go through the [`Reconciler`], which
//!   replaces the first slice that differs and dispatches it as a remote change
//! - **Echo suppression**: remote changes are recorded as the peer baseline
//!   and never broadcast back
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reactype_collab::{CollabClient, RelayConfig, WsConnector};
//! use reactype_editor::{Action, ChildKind};
//!
//! let config = RelayConfig::default();
//! let mut client = CollabClient::new(WsConnector::new(&config.server_url), config);
//!
//! client.join_room("design-review").await?;
//! client.apply(Action::AddChild {
//!     kind: ChildKind::HtmlElement,
//!     type_id: 11,
//!     child_id: None,
//! })?;
//! ```

mod client;
mod config;
mod hub;
mod marketplace;
mod protocol;
mod reconciler;
mod relay;
mod server;
mod session;
mod shared;
mod transport;

pub use client::CollabClient;
pub use config::{Config, RelayConfig, ServerConfig, DEFAULT_CONFIG_NAME};
pub use hub::{HubStats, RelayHub};
pub use marketplace::{
    Marketplace, MarketplaceError, ProjectDocument, PublishRequest, UnpublishRequest,
};
pub use protocol::{ClientFrame, Envelope, ProtocolError, ServerFrame, BROADCAST_LABEL};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use relay::{ChangeRelay, RelayEvent};
pub use server::RelayServer;
pub use session::{RoomSession, SessionError, SessionState};
pub use shared::{lock_store, shared_store, SharedStore};
pub use transport::{
    Connection, ConnectionGuard, Connector, FrameSender, Inbound, LocalConnector, TransportError,
    WsConnector,
};
