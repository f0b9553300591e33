pub mod detection_task;
pub mod eye_state_pipeline;
pub mod pipeline_logger;
pub mod track_eyes_use_case;
