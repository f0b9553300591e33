pub mod domain;
pub mod infrastructure;
pub mod worker_scheduler;
