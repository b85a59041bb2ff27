pub mod cache;
pub mod client;
pub mod detail;
pub mod render;
pub mod state;
