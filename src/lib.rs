//! Rango - a small content-categorization web application
//!
//! This library provides the core functionality of the Rango site: categories
//! of links, user accounts and the per-session visit counter.

pub mod cache;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod templates;
pub mod web;
