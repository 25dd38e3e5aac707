//! Notifications any front end can subscribe to. The flow never calls back
//! into a UI except through this stream.

use shared::error::FlowError;

use crate::session::FlowState;

#[derive(Debug, Clone)]
pub enum FlowEvent {
    StateChanged(FlowState),
    PredictionReady {
        predicted_age: u32,
        confidence: f32,
        second_attempt: bool,
    },
    Error(FlowError),
    SessionReset,
}
