pub mod admin;
pub mod auth;
pub mod cert_links;
pub mod certifications;
pub mod core;
pub mod reports;
pub mod teachers;
pub mod uploads;
