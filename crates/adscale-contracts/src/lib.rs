pub mod batch;
pub mod creative;
pub mod events;
pub mod session;
