//! Newsroom - a small CMS for authoring and publishing articles
//!
//! This library provides the content store, the content pipeline that
//! embeds uploaded images into article bodies, and the HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
