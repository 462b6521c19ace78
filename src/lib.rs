// SPDX-License-Identifier: MIT

//! relay-rs - deterministic graph workflows for LLM pipelines.
//!
//! The crate is split the same way its modules are used:
//! - [adk] - the agent development kit: model providers, the tool trait,
//!   and the shared error taxonomy.
//! - [relay] - the engine: workflow graphs, nodes, the executor, and the
//!   persisted handoff trail.

pub mod adk;
pub mod relay;
