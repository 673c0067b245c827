pub mod endpoints;
pub mod web_app;
