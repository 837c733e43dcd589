//! Slipway Core
//!
//! Core types and abstractions for the Slipway deployment pipeline.
//!
//! This crate contains:
//! - Domain types: repository references, build artefacts, deployment facts, runs
//! - DTOs: request/response bodies exchanged with the webhook server

pub mod domain;
pub mod dto;
