pub mod periodic_task;
pub mod renderer;
