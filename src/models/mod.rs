pub mod order;
pub mod package;
pub mod pending;
pub mod settings;
