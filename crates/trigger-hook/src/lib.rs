//! # trigger-hook
//!
//! GitHub webhook receiver that runs an external trigger command when a
//! repository belonging to a configured group is pushed to.
//!
//! ## How it works
//!
//! 1. GitHub sends `POST /` with `X-GitHub-Event`, `X-Hub-Signature` and
//!    `X-GitHub-Delivery` headers plus a JSON payload.
//! 2. The event type must be `push`, `pull_request` or `ping`.
//! 3. When `GH_SECRET` is set, the HMAC-SHA1 signature of the raw body is
//!    checked in constant time.
//! 4. For `push`, the ref is filtered (branches always pass, tags only when
//!    `HOOK_IGNORE_TAGS=false`), `repository.full_name` is mapped to its
//!    group and the group to a trigger endpoint.
//! 5. Each activated endpoint runs `<HOOK_TRIGGER_BIN> <endpoint>` in the
//!    background; the HTTP response does not wait for it.
//!
//! ## Responses
//!
//! | Condition | Status |
//! |---|---|
//! | not `POST` | 405 |
//! | wrong path | 404 |
//! | missing / unknown `X-GitHub-Event` | 400 |
//! | missing / bad `X-Hub-Signature` | 403 |
//! | unreadable body, invalid JSON, no `repository.full_name` on push | 500 |
//! | `ping` | 200 `pong` |
//! | `push` | 200 `ok` |
//! | `pull_request` | 200 `ignored` |
//!
//! See [`config::HookConfig`] for the environment variables.

pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod mocks;
pub mod server;
pub mod signal;
pub mod signature;

pub use config::{HookConfig, ServerConfig, TriggerConfig};
pub use dispatch::{CommandLauncher, DispatchError, DispatchOutcome, Dispatcher, TriggerLauncher};
pub use error::Rejection;
pub use server::{AppState, router, serve};
