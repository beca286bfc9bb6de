pub mod cache;
pub mod cli;
pub mod error;
pub mod numeric;
pub mod render;
pub mod stats;
pub mod status;
pub mod transcript;
pub mod util;
