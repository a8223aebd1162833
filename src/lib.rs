//! # studio_pm - Studio Project Management
//!
//! The core of a project dashboard for freelancers and small agencies: clients,
//! their projects split into ordered phases, scheduled tasks with an audited
//! status history, client meetings and a Monday-Sunday calendar view.
//!
//! ## Layout
//!
//! - [`client`], [`project`], [`task`], [`meeting`]: records with their draft and patch shapes.
//! - [`fields`]: status and priority enums shared by the records.
//! - [`lifecycle`]: task status transitions and their history entries.
//! - [`schedule`]: week windows, calendar grid placement and meeting conflicts.
//! - [`stats`]: progress, completion and dashboard figures.
//! - [`db`]: the in-memory record set, persisted as one JSON document.
//! - [`gateway`]: persistence, blob storage and plan suggestion seams, with local implementations.
//! - [`workspace`]: typed stores that keep local state and the gateways in step.
//! - [`cli`], [`cmd`], [`display`], [`config`]: the `spm` command line.
//!
//! ## Quick Start
//!
//! ```bash
//! spm client add "Joao Silva" --company "Tech Solutions" --status active
//! spm project add "E-commerce site" --client "Joao Silva" --due 2024-06-15
//! spm phase add "E-commerce site" Discovery
//! spm task add "Wireframes" --project "E-commerce site" --phase Discovery --hours 4
//! spm task status <id> in-progress --note "Started with the checkout flow"
//! spm week --date "next monday"
//! ```
//!
//! Data is stored in `~/.spm/` (or `--data-dir`, or `$SPM_DATA_DIR`): `spm.json` holds the
//! records, `blobs/` the uploaded files and an optional `config.toml` the settings.

pub mod cli;
pub mod client;
pub mod cmd;
pub mod config;
pub mod dates;
pub mod db;
pub mod display;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod lifecycle;
pub mod meeting;
pub mod project;
pub mod schedule;
pub mod stats;
pub mod task;
pub mod workspace;

pub use error::{Error, Result};
