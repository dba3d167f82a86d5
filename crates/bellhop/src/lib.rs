//! Interactive action host SDK.
//!
//! A bellhop host is a long-lived process that connects out to the
//! coordinator over one duplex channel and executes registered actions.
//! Each action drives an interactive session with a remote operator by
//! rendering IO components and awaiting their responses.
//!
//! ```no_run
//! use bellhop::{FnAction, Host, HostConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), bellhop::HostError> {
//! let mut host = Host::new(HostConfig::new("live_key"));
//! host.register_action(
//!     "greet",
//!     FnAction::new(|io, _ctx| async move {
//!         let name = io.input.text("Who are we greeting?").await?;
//!         Ok(json!({ "greeting": format!("Hello, {name}!") }))
//!     }),
//! );
//! let handle = host.listen().await?;
//! handle.closed().await;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod client;
pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod io;
pub mod loading;
pub mod method;
pub mod promise;

pub use action::{Action, ActionContext, FnAction};
pub use client::GroupValidator;
pub use config::{init_logging, HostConfig, LogLevel, DEFAULT_ENDPOINT};
pub use error::{ActionError, HostError, IoError};
pub use host::{Connector, Host, HostHandle};
pub use io::{FileUpload, Io, SearchOptions, SelectOption};
pub use loading::{LoadingOptions, TransactionLoading};
pub use method::MethodName;
pub use promise::{ExclusiveIoPromise, IoGroupPromise, IoPromise};
