//! Gateway relay: authorization, dispatch, and the HTTP server

pub mod auth;
pub mod router;
pub mod server;

pub use server::Gateway;
