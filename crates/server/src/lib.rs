//! Landing judge server
//!
//! Serves the browser overlay, fans vote/theme/preview/settings events out
//! over server-sent events, and exposes the control API the Stream Deck and
//! the command line client talk to.

pub mod cli;
pub mod client;
pub mod error;
pub mod http;
pub mod hub;
pub mod overlay;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, ClientError};
pub use http::router;
pub use hub::EventHub;
pub use state::AppState;
