//! Hue Oozie dashboard
//!
//! Lists workflow and coordinator jobs, shows job and action details and
//! forwards job control requests, all through an [`client::OozieApi`]
//! client. Every view exposing a single job goes through
//! [`gate::check_access_and_get_job`].

pub mod client;
pub mod dashboard;
pub mod gate;
pub mod handlers;
pub mod models;

#[cfg(test)]
mod fake;

pub use client::{OozieApi, OozieClient, RestError};
pub use handlers::{router, DashboardState};
