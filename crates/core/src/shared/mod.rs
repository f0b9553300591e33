pub mod asset_resolver;
pub mod constants;
pub mod frame;
pub mod rect;
pub mod settings;
