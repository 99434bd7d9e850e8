//! Loan approval decision support.
//!
//! Applicant records are encoded, scaled, and scored by a pre-trained logistic model loaded
//! once at startup. Every decision carries a risk tier and a ranked feature attribution, and
//! single decisions are appended to an audit store that feeds drift monitoring and analytics.

pub mod config;
pub mod error;
pub mod lending;
pub mod telemetry;
