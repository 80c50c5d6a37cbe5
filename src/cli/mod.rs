pub mod render;
pub mod setup;
pub mod ui;
