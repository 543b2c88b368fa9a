//! Dronehub - content store of a drone club site
//!
//! This library provides the content repositories, the comment moderation
//! gate, the category and weather renderers and the MySQL import pipeline.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod transfer;
