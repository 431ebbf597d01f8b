//! The inference gateway's HTTP surface: request pipeline, provider
//! adapters wiring, routes, and middleware. [`state::AppState`] is the
//! composition root a binary (or embedder) constructs and passes to
//! [`server::run`].

pub mod adapters;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{build_router, run};
pub use state::AppState;
