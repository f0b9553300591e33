pub mod png_preview_sink;
pub mod threaded_worker;
