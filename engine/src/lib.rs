//! # Tandem Engine
//!
//! Keep records in step across heterogeneous stores.
//!
//! Every change is expressed as a [`Transform`] (`add`, `replace`, `patch`,
//! `remove`) against a record type. A [`Store`] applies transforms, answers
//! queries and announces each applied transform through its [`Notifier`].
//! Stores can be chained with a [`SyncLink`] so one store replays whatever
//! another applies.
//!
//! ## Identity
//!
//! Records carry two identifiers:
//! - a local ID (`__id`), generated by the engine and never sent to a backend
//! - a remote ID (`id`), assigned by the backend and known only after it answers
//!
//! Either may address a record; the local ID wins when both are given.
//!
//! ## Stores
//!
//! - [`MemoryStore`] keeps everything in process.
//! - [`RestStore`] maps transforms onto HTTP requests through a pluggable
//!   [`Transport`] and caches what the backend answers.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tandem_engine::{link, IdentifierRef, MemoryStore, StoreExt};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tandem_engine::Result<()> {
//! let primary = MemoryStore::new();
//! let backup = Arc::new(MemoryStore::new());
//! let sync = link(&primary, backup.clone());
//!
//! let planet = primary
//!     .add("planet", json!({"name": "Jupiter", "classification": "gas giant"}))
//!     .await?;
//!
//! sync.settled().await;
//! let copy = backup
//!     .find_one("planet", IdentifierRef::Local(planet.local_id.clone()))
//!     .await?;
//! assert_eq!(copy.get("name"), Some(&json!("Jupiter")));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod link;
pub mod memory;
pub mod notify;
pub mod record;
pub mod rest;
pub mod store;
pub mod table;
pub mod transform;
pub mod transport;

pub use config::{ConfigError, RestConfig};
pub use error::{Error, Result};
pub use identity::{IdentifierRef, LocalId, RemoteId, LOCAL_ID_KEY, REMOTE_ID_KEY};
pub use link::{link, IdentifierScope, SyncLink};
pub use memory::MemoryStore;
pub use notify::{DidTransform, EventKind, Notifier, StoreEvent, SubscriptionId};
pub use record::{Attributes, Record};
pub use rest::RestStore;
pub use store::{Found, Query, Store, StoreExt};
pub use transform::{InvalidPayload, Payload, Transform, Verb};
pub use transport::{HttpTransport, Method, Transport};

/// Name of a record type, e.g. `"planet"`
pub type RecordType = String;
