pub mod adapters;
pub mod error;
pub mod hub;
pub mod matcher;
pub mod notifier;
pub mod pipeline;
pub mod ticket;
