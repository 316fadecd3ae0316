//! Lyrics Post API library.
//!
//! A CRUD REST API over MongoDB serving lyrics posts, categories,
//! subcategories, an append-only notification feed and a single-tenant
//! admin login.

pub mod auth;
pub mod config;
pub mod store;
pub mod web;
