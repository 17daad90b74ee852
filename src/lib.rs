// src/lib.rs

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod logging;
pub mod render;
pub mod service;
pub mod storage;
pub mod tabular;
