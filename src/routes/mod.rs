pub mod auth;
pub mod chamas;
pub mod contributions;
pub mod expenses;
pub mod goals;
pub mod health;
pub mod votes;
pub mod webhooks;
