pub mod assets;
pub mod health_check;
