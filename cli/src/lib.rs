//! Idempotent provisioning engine for Debian/Ubuntu developer workstations.
//!
//! Installs packages, clones plugin repositories, copies and links
//! configuration files, and installs CLI and AI-agent tools. Every unit of
//! work probes before acting, so re-runs only do what is missing.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: parse and validate `conf/phases.toml`
//! - **[`resources`]**: side-effect-free probes and acquisition strategies
//! - **[`phases`]**: installer steps grouped into ordered, skippable phases
//! - **[`commands`]**: top-level subcommands (`install`, `doctor`, `update`, `version`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod phases;
pub mod platform;
pub mod resources;
