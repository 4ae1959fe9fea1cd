//! Shared Application State
//!
//! Created once at startup and handed to every handler and socket task.

use crate::config::Config;
use std::sync::Arc;
use tutorchat_core::tutor::TutorAgent;

#[derive(Clone)]
pub struct AppState {
    pub tutor: Arc<dyn TutorAgent>,
    pub config: Arc<Config>,
}
