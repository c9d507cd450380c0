//! Core business logic, independent of the HTTP layer.

/// Spending trends and per-department share
pub mod analytics;
/// Overspending detection and anomaly lifecycle
pub mod anomaly;
/// Text-generation backend used by the chatbot
pub mod assistant;
/// Accounts, password hashing and session tokens
pub mod auth;
/// Assistant sessions per user and institution
pub mod chatbot;
/// User to department messaging
pub mod conversation;
/// Sankey aggregation of allocations
pub mod flowchart;
/// Institution and department lookup and linking
pub mod institution;
/// Role to capability mapping
pub mod policy;
/// Department spending reports
pub mod spending;
/// Institution allocations and their verification
pub mod transaction;
/// Upload validation, parsing and storage
pub mod upload;
