pub mod annotation;
pub mod detection_strategy;
pub mod eye_filter;
pub mod eye_regions;
pub mod eye_status;
pub mod face_locator;
pub mod object_detector;
