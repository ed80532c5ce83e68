pub mod error;
pub mod model;
pub mod scheduler;
pub mod throttle;
pub mod worker;
