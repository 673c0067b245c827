mod tracing;

pub use self::tracing::set_up_logging;
