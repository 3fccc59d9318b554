#![allow(clippy::doc_markdown)] // Allow technical terms like VRAM, FNV in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Render Queue Core
//!
//! Routing and reliability core for a media-production task queue.
//!
//! ## Overview
//!
//! This crate decides where every task goes and what happens when it fails.
//! Submissions are mapped deterministically to one of a fixed set of
//! resource-affine queues (GPU generation, GPU processing, CPU analysis,
//! thumbnails, I/O, batch), assigned a numeric priority, deduplicated by
//! content hash, and handed to a broker. Failures flow through a classifier
//! and a per-queue backoff policy into either a scheduled retry or a dated
//! dead-letter bucket. A monitoring loop samples queue depth and rolling
//! rates, fires cooldown-gated alerts, and persists per-minute snapshots;
//! per-worker health loops aggregate check results into a 0-1 score and can
//! restart a worker whose heartbeat goes critical.
//!
//! ## Architecture
//!
//! The crate is transport- and storage-agnostic: everything external sits
//! behind the [`broker::QueueBroker`] and [`storage::QueueStore`] traits,
//! with in-memory implementations included for tests and embedding. The
//! [`service::QueueService`] facade wires the components together; each
//! component is also usable on its own.
//!
//! ## Module Organization
//!
//! - [`router`] - Queue selection, priority computation, dedup, route cache
//! - [`dlq`] - Failure classification, backoff policies, retry/demotion
//! - [`monitor`] - Rate tracking, threshold alerts, the sampling loop
//! - [`health`] - Worker health checks, score aggregation, restart seam
//! - [`registry`] - The static queue topology
//! - [`broker`] / [`storage`] - External seams plus in-memory implementations
//! - [`service`] - The [`service::QueueService`] facade
//! - [`config`] / [`error`] / [`metrics`] / [`logging`] - Ambient plumbing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_queue_core::broker::InMemoryBroker;
//! use render_queue_core::config::QueueCoreConfig;
//! use render_queue_core::service::QueueService;
//! use render_queue_core::storage::InMemoryStore;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = QueueService::new(
//!     Arc::new(InMemoryBroker::new()),
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(|alert| eprintln!("alert: {}", alert.message)),
//!     None,
//!     QueueCoreConfig::from_env()?,
//! )?;
//! service.start().await;
//!
//! let outcome = service
//!     .submit("video.generate_image", vec![], HashMap::new())
//!     .await?;
//! println!("routed to {} at priority {}", outcome.queue_name, outcome.priority);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod constants;
pub mod dlq;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod router;
pub mod service;
pub mod storage;

pub use config::QueueCoreConfig;
pub use constants::{FailureOutcome, HealthStatus, ResourceAffinity};
pub use error::{QueueCoreError, Result};
pub use service::{QueueService, SubmitOutcome};
