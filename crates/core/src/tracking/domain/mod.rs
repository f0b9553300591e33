pub mod event_timestamps;
pub mod eye_accumulator;
pub mod shared_eye_state;
pub mod temporal_state_tracker;
