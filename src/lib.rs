//! # sp_scheduler
//!
//! Task admission, scheduling and on-chain commit core for a storage-provider
//! node.
//!
//! A storage provider accepts uploads and downloads, replicates and seals
//! object data, and garbage-collects stale objects, all while staying inside
//! memory, file-descriptor, connection and task budgets and submitting signed
//! transactions to a chain. This crate is the part that decides *whether* work
//! may start, *in what order* it runs, *how often* it is retried, and *which
//! nonce* a transaction gets.
//!
//! ## Components
//!
//! - **Resource manager** ([`core::ResourceManager`]): admission control.
//!   Reservations are granted or denied immediately against per-class and
//!   node-wide ceilings; nothing waits for capacity.
//! - **Priority task queue** ([`core::TaskQueue`]): High before Medium before
//!   Low, FIFO within a class, optionally capacity-limited.
//! - **Lifecycle policy** ([`core::LifecyclePolicy`]): per task-type timeout,
//!   pacing and retry budget.
//! - **Chain signer** ([`signer::SignerClient`]): one key and one serialized
//!   nonce counter per signing scope, with resynchronization on sequence
//!   mismatch.
//!
//! [`runtime::Dispatcher`] ties them together: producers submit, workers pop
//! and execute, and every reservation is released exactly once when its task
//! finishes or is abandoned.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sp_scheduler::builders::NodeBuilder;
//! use sp_scheduler::config::NodeConfig;
//! use sp_scheduler::core::{PriorityClass, ResourceRequest, Task, TaskType, MIB};
//! use sp_scheduler::runtime::Dispatcher;
//!
//! let ctx = NodeBuilder::new(NodeConfig::default()).build().await?;
//! let dispatcher = Dispatcher::new(Arc::new(ctx));
//! let upload = Task::new(TaskType::Upload, 0).with_object(7, 10 * 1024 * 1024);
//! dispatcher.submit(upload, ResourceRequest::new(PriorityClass::High).with_memory(10 * MIB))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models and defaulting.
pub mod config;
/// Builders to construct node components from configuration.
pub mod builders;
/// Infrastructure adapters for queues.
pub mod infra;
/// Node wiring and caller-facing API.
pub mod runtime;
/// Chain signer.
pub mod signer;
/// Shared utilities.
pub mod util;
