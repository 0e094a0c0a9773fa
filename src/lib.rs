//! A thin web service over the Google Drive API: per-user folders, listing
//! views, and upload, download, delete and share wrappers.

pub mod config;
pub mod error;
pub mod google_drive;
pub mod listing;
pub mod model;
pub mod prelude;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
