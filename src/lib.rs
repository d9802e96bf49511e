//! Subscription Service - Subscription Lifecycle and Payment Reconciliation
//!
//! This crate manages free trials, paid subscriptions, and plan changes,
//! delegating payment processing to Stripe and reconciling local state
//! from processor webhook events.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
