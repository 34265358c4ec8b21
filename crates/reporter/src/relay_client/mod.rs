//! Clients for the relayer: reporter and viewer sockets, admin HTTP.

pub mod admin;
pub mod ws;

pub use admin::send_route;
pub use ws::{run_reporter, run_viewer};
