pub mod capture;
pub mod detection;
pub mod events;
pub mod pipeline;
pub mod scheduler;
pub mod shared;
pub mod tracking;
