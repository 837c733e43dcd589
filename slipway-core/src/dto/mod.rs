//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the webhook server and its
//! callers (source forges, the CLI).

pub mod push;

pub use push::{GithubPushEvent, GithubRepository, GithubTriggerResponse, PushRequest};
