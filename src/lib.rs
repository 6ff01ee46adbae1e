//! Backend and client logic of the Neynar Score mini app.
//!
//! * [`score`] resolves a Farcaster id into a reputation score, either
//!   straight from the Neynar API or through this deployment's proxy.
//! * [`app`] is the in-app presentation state: start-up, the score
//!   check and the share, donate and bookmark actions.
//! * [`og`] renders the social preview card of a score.
//! * [`embed`] builds the metadata link previews read.
//! * [`server`] exposes all of it over HTTP.
#[macro_use]
extern crate lazy_static;

pub mod app;
pub mod config;
pub mod embed;
mod errors;
pub mod fetch;
pub mod host;
pub mod og;
pub mod score;
pub mod server;

pub use config::Config;
pub use errors::{HostError, MiniAppError, Result};
