//! Terminal client for multi-agent discussions.
//!
//! A discussion is polled as whole snapshots; new transcript entries are
//! reconciled onto a [`render::RenderSurface`] with an optional typing
//! animation, and the round ends when the backend pauses for a vote,
//! finishes with a report, or fails.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod live;
pub mod markup;
pub mod model;
pub mod orchestration;
pub mod poller;
pub mod queue;
pub mod reconciler;
pub mod render;
pub mod scroll;
pub mod session;
pub mod speaker;
pub mod store;
pub mod visibility;

pub use api::ApiClient;
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use live::{LiveOptions, LiveView, ViewHandle, ViewOutcome};
pub use model::{DiscussionSnapshot, DiscussionStatus, Turn};
pub use poller::{spawn_poller, DiscussionSource, PollEvent, PollerHandle, RetryPolicy};
pub use render::{MemorySurface, RenderSurface, TerminalSurface};
pub use session::DiscussionSession;
