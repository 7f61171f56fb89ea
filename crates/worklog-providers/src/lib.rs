//! HTTP-backed implementations of the core collaborator traits: Tempo
//! worklogs, Jira issues, Odoo timesheets and SMTP reports.

mod http;
pub mod jira;
mod jira_models;
pub mod odoo;
mod odoo_models;
pub mod registry;
pub mod smtp;
pub mod tempo;
mod tempo_models;

pub use registry::{Collaborators, notifier_for};
