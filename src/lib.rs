//! Refurb Hub API Library
//!
//! This crate provides the lifecycle engine for instrument refurbishment
//! requests: request submission with human-readable codes, a configurable
//! status workflow with audit logging, daily completion tracking, capacity
//! metrics, and a change feed for live views.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod services;
pub mod session;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::lifecycle::LifecycleDefinition;
use crate::services::completions::CompletionService;
use crate::services::metrics::MetricsService;
use crate::services::requests::RequestService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub requests: RequestService,
    pub completions: CompletionService,
    pub metrics: MetricsService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let lifecycle = LifecycleDefinition::for_model(config.lifecycle_model);
        let requests = RequestService::new(db.clone(), lifecycle, event_sender.clone());
        let completions = CompletionService::new(db.clone(), event_sender.clone());
        let metrics = MetricsService::new(db.clone());
        Self {
            db,
            config,
            event_sender,
            requests,
            completions,
            metrics,
        }
    }
}
