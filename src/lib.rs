pub mod error;
pub mod types;

pub mod bindings;
pub mod engine;
pub mod id;
pub mod overlay;
pub mod registry;
pub mod view;
