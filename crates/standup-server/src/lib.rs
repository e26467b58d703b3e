// HTTP service for submitting standups and browsing their summaries.

pub mod error;
pub mod routes;
pub mod submission;
