pub mod auth;
pub mod contacts;
