pub mod requests;
pub mod webhooks;
