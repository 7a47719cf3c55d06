//! Telco BPMS API Library
//!
//! This library provides the core functionality for the telecom sales BPMS:
//! the eight-step case wizard, external service adapters (identity, credit
//! bureaus, CRM), the contract mailer and its relay, authentication, and the
//! supervision portal.
//!
//! # Modules
//!
//! - `adapters`: External service adapters (identity, credit bureaus, CRM).
//! - `auth`: Login gate and session storage.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `mailer`: Contract confirmation email and relay client.
//! - `models`: Core data models.
//! - `otp`: OTP issuance and verification.
//! - `portal`: Supervision portal data and endpoints.
//! - `relay`: Mail relay HTTP surface.
//! - `simulation`: Deterministic demo-data generation.
//! - `steps`: Per-step operations of the sales flow.
//! - `wizard`: The eight-step case state machine.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod otp;
pub mod portal;
pub mod relay;
pub mod simulation;
pub mod steps;
pub mod wizard;
