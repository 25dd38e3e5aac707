use shared::protocol::Prediction;

/// Every state the interaction can occupy.
///
/// The result states are pass-through: a successful prediction enters
/// `FirstResult` (or `SecondResult`) and immediately advances to the
/// matching feedback state within the same intent handler, so observers
/// see both transitions but nothing ever suspends in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    ImageSelected,
    Predicting,
    FirstResult,
    AwaitingFirstFeedback,
    ChoiceOffered,
    SecondRangeInput,
    SecondPredicting,
    SecondResult,
    AwaitingSecondFeedback,
    ActualAgeInput,
    Accepted { second_attempt: bool },
    Completed,
}

impl FlowState {
    /// Terminal states schedule an automatic return to `Idle`.
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Accepted { .. } | FlowState::Completed)
    }
}

/// Single-visit session state, owned exclusively by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: FlowState,
    pub has_image: bool,
    pub predicted_age: u32,
    pub confidence: f32,
    pub is_second_attempt: bool,
    /// Bumped on every reset; an in-flight response captured under an
    /// older epoch is stale and gets discarded.
    pub epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            has_image: false,
            predicted_age: 0,
            confidence: 0.0,
            is_second_attempt: false,
            epoch: 0,
        }
    }

    /// Full reset back to `Idle`; only the epoch survives, incremented.
    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
        self.has_image = false;
        self.predicted_age = 0;
        self.confidence = 0.0;
        self.is_second_attempt = false;
        self.epoch += 1;
    }

    /// The only place prediction fields are written.
    pub fn store_prediction(&mut self, prediction: Prediction) {
        self.predicted_age = prediction.predicted_age;
        self.confidence = prediction.confidence;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
