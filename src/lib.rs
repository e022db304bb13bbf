//! # PharmaGuard
//!
//! Gateway for pharmacogenomic analysis of VCF uploads.
//!
//! PharmaGuard accepts a patient VCF file and a list of drugs, validates
//! the upload, delegates the analysis to an external engine, and returns
//! the per-drug risk report. When the engine is unreachable it still
//! answers, with a cached reference payload or a clearly-flagged degraded
//! report. Every answer is appended to a bounded, file-backed history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Structural │──▶│  Analysis  │──▶│   Fallback   │
//! │ Validator│   │ Validator  │   │   Engine   │   │ cached/degr. │
//! └──────────┘   └────────────┘   └─────┬──────┘   └──────┬───────┘
//!                                       └────────┬────────┘
//!                                                ▼
//!                                          ┌──────────┐
//!                                          │ Log Store│
//!                                          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pharmaguard serve                                   # start HTTP server
//! pharmaguard analyze sample.vcf --drugs WARFARIN,CODEINE
//! pharmaguard logs list --limit 10
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Error taxonomy and client-facing messages |
//! | [`telemetry`] | Tracing subscriber setup |
//! | [`upload`] | Temporary upload files and upload checks |
//! | [`validator_client`] | External VCF structural validator |
//! | [`analysis_client`] | External analysis engine with retries |
//! | [`fallback`] | Ordered response providers |
//! | [`log_store`] | JSON-file analysis history |
//! | [`orchestrator`] | End-to-end analyze pipeline |
//! | [`server`] | HTTP API |

pub mod analysis_client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod log_store;
pub mod orchestrator;
pub mod server;
pub mod telemetry;
pub mod upload;
pub mod validator_client;
