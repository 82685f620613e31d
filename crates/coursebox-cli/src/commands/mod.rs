//! Command handlers

pub mod config;
pub mod course;
pub mod question;
pub mod status;
pub mod sync;
