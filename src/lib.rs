pub mod config;
pub mod controller;
pub mod dispatch;
pub mod executor;
pub mod mapping;
pub mod osd;
pub mod surface;
