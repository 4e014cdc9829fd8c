//! Database access for tga-api
//!
//! Free functions over a pool or a transaction. Schema creation lives in
//! `tga_common::db::init`.

pub mod attachments;
pub mod dispatches;
pub mod genres;
pub mod requests;
pub mod users;
