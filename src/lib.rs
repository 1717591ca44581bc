pub mod admin;
pub mod assignment_sync;
pub mod bulk_assignments;
pub mod bulk_import;
pub mod bulk_referees;
pub mod bulk_results;
pub mod card_sync;
pub mod config;
pub mod db;
pub mod logging;
pub mod match_identifier;
pub mod model;
pub mod rating_sync;
pub mod stats_export;
pub mod stats_rebuild;
pub mod stats_store;
