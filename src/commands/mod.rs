pub mod analyze;
pub mod subscribers;
pub mod watch;
