pub mod action;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod params;
pub mod platform;
pub mod registry;
pub mod runner;
pub mod value;
