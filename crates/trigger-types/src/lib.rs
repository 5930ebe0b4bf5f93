//! Domain types for the push-to-trigger webhook bridge.
//!
//! Everything here is pure: no sockets, no processes, no clocks. The
//! `trigger-hook` service crate composes these pieces into the request
//! pipeline.
//!
//! - [`event`]: which `X-GitHub-Event` values are understood
//! - [`refs`]: branch/tag classification and the tag-ignore policy
//! - [`routing`]: repository → group → trigger endpoint tables
//! - [`payload`]: the handful of JSON fields read from a push delivery

pub mod event;
pub mod payload;
pub mod refs;
pub mod routing;

pub use event::{Classification, EventType, classify};
pub use payload::{PayloadError, PushEvent};
pub use refs::{RefKind, should_ignore};
pub use routing::{
    ActivatedTriggerSet, GroupTriggerTable, RepositoryGroupTable, RoutesError, RoutingTables,
};
