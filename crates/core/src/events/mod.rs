pub mod event_adapter;
