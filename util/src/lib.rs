pub mod config;
pub mod str_util;
