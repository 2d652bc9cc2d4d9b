pub mod config;
pub mod data;
pub mod points;
pub mod rank;
pub mod stats;
pub mod sync;
pub mod time;
