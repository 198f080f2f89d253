//! HTTP front end for the mediaforge conversion service.

pub mod api;
pub mod metrics;
pub mod state;
