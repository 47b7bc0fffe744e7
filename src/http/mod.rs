//! HTTP API server for the surrounding web application
//!
//! This module provides a REST API for driving interview sessions:
//! - GET/DELETE /interviews/draft/:account - Draft recovery check
//! - POST /interviews/start | /interviews/resume - Session lifecycle
//! - POST /interviews/:id/theme|respond|spoken|retry - Conversation
//! - POST /interviews/:id/finish|split|cancel - Completion control
//! - GET /interviews/:id/status|result - Queries
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
