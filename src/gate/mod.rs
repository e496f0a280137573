//! The mTLS gate: listener, per-connection handshake, and the confirmation
//! handler that authenticated connections are handed to.

pub mod handler;
pub mod server;

pub use handler::create_router;
pub use server::Gate;
