use std::{sync::Arc, time::Duration};

use particles::{BurstKind, ParticleEngine};
use prediction::{ImageUpload, PredictionProvider};
use shared::{
    domain::{AgeRange, ModalId},
    error::FlowError,
    protocol::{FeedbackRecord, Prediction},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};

use crate::{
    events::FlowEvent,
    modal::ModalManager,
    session::{FlowState, Session},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Timer knobs; production defaults match the page's pacing.
#[derive(Debug, Clone, Copy)]
pub struct FlowConfig {
    /// Delay before an accepted prediction resets the session.
    pub accept_reset_delay: Duration,
    /// Delay before a completed (actual-age) session resets.
    pub complete_reset_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            accept_reset_delay: Duration::from_secs(5),
            complete_reset_delay: Duration::from_secs(7),
        }
    }
}

struct ControllerInner {
    session: Session,
    image: Option<ImageUpload>,
    auto_reset: Option<JoinHandle<()>>,
}

/// The interaction state machine.
///
/// Owns the session exclusively and sequences the prediction provider,
/// modal manager, and particle engine. Intents arriving in a state they
/// are not valid for are ignored with a log line; nothing here panics or
/// leaves the machine in an undefined state.
#[derive(Clone)]
pub struct FlowController {
    inner: Arc<Mutex<ControllerInner>>,
    provider: Arc<dyn PredictionProvider>,
    modals: ModalManager,
    particles: ParticleEngine,
    events: broadcast::Sender<FlowEvent>,
    config: FlowConfig,
}

impl FlowController {
    pub fn new(
        provider: Arc<dyn PredictionProvider>,
        modals: ModalManager,
        particles: ParticleEngine,
    ) -> Self {
        Self::with_config(provider, modals, particles, FlowConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn PredictionProvider>,
        modals: ModalManager,
        particles: ParticleEngine,
        config: FlowConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(ControllerInner {
                session: Session::new(),
                image: None,
                auto_reset: None,
            })),
            provider,
            modals,
            particles,
            events,
            config,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub fn modals(&self) -> &ModalManager {
        &self.modals
    }

    fn emit(&self, event: FlowEvent) {
        let _ = self.events.send(event);
    }

    fn transition(&self, inner: &mut ControllerInner, state: FlowState) {
        debug!(from = ?inner.session.state, to = ?state, "flow transition");
        inner.session.state = state;
        self.emit(FlowEvent::StateChanged(state));
    }

    /// A missing file is a silent no-op; selecting outside `Idle` or
    /// `ImageSelected` is ignored.
    pub async fn select_image(&self, image: Option<ImageUpload>) {
        let Some(image) = image else {
            debug!("select_image without a file; ignoring");
            return;
        };
        let mut inner = self.inner.lock().await;
        match inner.session.state {
            FlowState::Idle | FlowState::ImageSelected => {
                info!(
                    filename = %image.filename,
                    size_bytes = image.bytes.len(),
                    "image selected"
                );
                inner.image = Some(image);
                inner.session.has_image = true;
                self.transition(&mut inner, FlowState::ImageSelected);
            }
            state => warn!(?state, "select_image ignored in current state"),
        }
    }

    /// Returns to `Idle` and notifies the server that the image is gone.
    /// The notification is fire-and-forget and never blocks the transition.
    pub async fn remove_image(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.image.is_none() && inner.session.state == FlowState::Idle {
                debug!("remove_image with nothing selected; ignoring");
                return;
            }
            inner.image = None;
            Self::cancel_auto_reset(&mut inner);
            inner.session.reset();
            self.transition(&mut inner, FlowState::Idle);
        }
        self.modals.hide_all().await;
        self.emit(FlowEvent::SessionReset);
        info!("image removed, session cleared");

        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(err) = provider.notify_image_removed().await {
                warn!(error = %err, "image removal notification failed");
            }
        });
    }

    /// First prediction round. Rejected while a request is outstanding:
    /// at most one network call per session is ever in flight.
    pub async fn request_prediction(&self) {
        let (image, epoch) = {
            let mut inner = self.inner.lock().await;
            match inner.session.state {
                FlowState::Predicting | FlowState::SecondPredicting => {
                    warn!("prediction already outstanding; intent ignored");
                    return;
                }
                FlowState::ImageSelected => {}
                state => {
                    if !inner.session.has_image {
                        self.emit(FlowEvent::Error(FlowError::Validation(
                            "select an image before predicting".to_string(),
                        )));
                    } else {
                        warn!(?state, "request_prediction ignored in current state");
                    }
                    return;
                }
            }
            let Some(image) = inner.image.clone() else {
                inner.session.has_image = false;
                self.emit(FlowEvent::Error(FlowError::Validation(
                    "select an image before predicting".to_string(),
                )));
                return;
            };
            self.transition(&mut inner, FlowState::Predicting);
            (image, inner.session.epoch)
        };

        // The network call runs without holding the session lock.
        let result = self.provider.predict(&image, None).await;
        self.finish_prediction(result, epoch, false).await;
    }

    /// User accepted or rejected the current estimate.
    pub async fn answer_feedback(&self, accepted: bool) {
        let mut inner = self.inner.lock().await;
        match inner.session.state {
            FlowState::AwaitingFirstFeedback if accepted => {
                let record =
                    FeedbackRecord::accepted(inner.session.predicted_age, inner.session.confidence);
                self.transition(
                    &mut inner,
                    FlowState::Accepted {
                        second_attempt: false,
                    },
                );
                self.enter_terminal(
                    &mut inner,
                    ModalId::FirstSuccess,
                    BurstKind::FirstSuccess,
                    Some(record),
                    self.config.accept_reset_delay,
                )
                .await;
            }
            FlowState::AwaitingFirstFeedback => {
                self.transition(&mut inner, FlowState::ChoiceOffered);
                self.modals.show(ModalId::AnotherChance).await;
            }
            FlowState::AwaitingSecondFeedback if accepted => {
                let record =
                    FeedbackRecord::accepted(inner.session.predicted_age, inner.session.confidence);
                self.transition(
                    &mut inner,
                    FlowState::Accepted {
                        second_attempt: true,
                    },
                );
                self.enter_terminal(
                    &mut inner,
                    ModalId::SecondSuccess,
                    BurstKind::SecondSuccess,
                    Some(record),
                    self.config.accept_reset_delay,
                )
                .await;
            }
            FlowState::AwaitingSecondFeedback => {
                // Retries are capped at one; go straight to the exact-age
                // input, no second choice round.
                self.transition(&mut inner, FlowState::ActualAgeInput);
            }
            state => warn!(?state, accepted, "answer_feedback ignored in current state"),
        }
    }

    /// From the choice overlay: retry with a narrowed range.
    pub async fn choose_retry(&self) {
        let mut inner = self.inner.lock().await;
        if inner.session.state != FlowState::ChoiceOffered {
            warn!(state = ?inner.session.state, "choose_retry ignored in current state");
            return;
        }
        inner.session.is_second_attempt = true;
        self.transition(&mut inner, FlowState::SecondRangeInput);
        self.modals.hide(ModalId::AnotherChance).await;
    }

    /// From the choice overlay: skip the retry and tell us the real age.
    pub async fn choose_tell_age(&self) {
        let mut inner = self.inner.lock().await;
        if inner.session.state != FlowState::ChoiceOffered {
            warn!(state = ?inner.session.state, "choose_tell_age ignored in current state");
            return;
        }
        self.transition(&mut inner, FlowState::ActualAgeInput);
        self.modals.hide(ModalId::AnotherChance).await;
    }

    /// Second prediction round, hinted with the user's selected range.
    pub async fn submit_range(&self, range: &str) {
        let hint: AgeRange = match range.parse() {
            Ok(hint) => hint,
            Err(err) => {
                self.emit(FlowEvent::Error(err));
                return;
            }
        };
        let (image, epoch) = {
            let mut inner = self.inner.lock().await;
            match inner.session.state {
                FlowState::Predicting | FlowState::SecondPredicting => {
                    warn!("prediction already outstanding; intent ignored");
                    return;
                }
                FlowState::SecondRangeInput => {}
                state => {
                    warn!(?state, "submit_range ignored in current state");
                    return;
                }
            }
            let Some(image) = inner.image.clone() else {
                self.emit(FlowEvent::Error(FlowError::Validation(
                    "no image available for re-prediction".to_string(),
                )));
                return;
            };
            self.transition(&mut inner, FlowState::SecondPredicting);
            (image, inner.session.epoch)
        };

        let result = self.provider.predict(&image, Some(hint)).await;
        self.finish_prediction(result, epoch, true).await;
    }

    /// The user's true age; validated 1-100 with no transition on failure.
    pub async fn submit_actual_age(&self, age: u32) {
        let mut inner = self.inner.lock().await;
        if inner.session.state != FlowState::ActualAgeInput {
            warn!(state = ?inner.session.state, "submit_actual_age ignored in current state");
            return;
        }
        if !(1..=100).contains(&age) {
            self.emit(FlowEvent::Error(FlowError::Validation(format!(
                "age {age} is outside 1-100"
            ))));
            return;
        }
        let record = FeedbackRecord::corrected(
            inner.session.predicted_age,
            age,
            inner.session.confidence,
        );
        info!(
            predicted_age = record.predicted_age,
            actual_age = age,
            is_correct = record.is_correct,
            "actual age submitted"
        );
        self.transition(&mut inner, FlowState::Completed);
        self.enter_terminal(
            &mut inner,
            ModalId::Thanks,
            BurstKind::Completed,
            Some(record),
            self.config.complete_reset_delay,
        )
        .await;
    }

    /// Valid from any state; also the auto-reset target.
    pub async fn reset(&self) {
        {
            let mut inner = self.inner.lock().await;
            Self::cancel_auto_reset(&mut inner);
            inner.image = None;
            inner.session.reset();
            self.transition(&mut inner, FlowState::Idle);
        }
        self.modals.hide_all().await;
        self.emit(FlowEvent::SessionReset);
        info!("session reset");
    }

    /// Manual dismissal cancels the pending auto-reset so it cannot fire a
    /// second time, then resets immediately if the session sat in a
    /// terminal state.
    pub async fn dismiss_modal(&self, id: ModalId) {
        self.modals.hide(id).await;
        let terminal = {
            let mut inner = self.inner.lock().await;
            Self::cancel_auto_reset(&mut inner);
            inner.session.state.is_terminal()
        };
        if terminal {
            self.reset().await;
        }
    }

    /// Shared tail of both prediction rounds. The epoch captured when the
    /// request went out decides whether the response still belongs to this
    /// session; anything else is stale and dropped.
    async fn finish_prediction(
        &self,
        result: anyhow::Result<Prediction>,
        epoch: u64,
        second_attempt: bool,
    ) {
        let mut inner = self.inner.lock().await;
        if inner.session.epoch != epoch {
            debug!("stale prediction response discarded");
            return;
        }
        let expected = if second_attempt {
            FlowState::SecondPredicting
        } else {
            FlowState::Predicting
        };
        if inner.session.state != expected {
            debug!(state = ?inner.session.state, "prediction response no longer expected; discarded");
            return;
        }
        match result {
            Ok(prediction) => {
                inner.session.store_prediction(prediction);
                if second_attempt {
                    self.transition(&mut inner, FlowState::SecondResult);
                    self.transition(&mut inner, FlowState::AwaitingSecondFeedback);
                } else {
                    self.transition(&mut inner, FlowState::FirstResult);
                    self.transition(&mut inner, FlowState::AwaitingFirstFeedback);
                }
                self.emit(FlowEvent::PredictionReady {
                    predicted_age: prediction.predicted_age,
                    confidence: prediction.confidence,
                    second_attempt,
                });
            }
            Err(err) => {
                warn!(error = %err, second_attempt, "prediction failed");
                // The image stays selected so the user can retry in place.
                let fallback = if second_attempt {
                    FlowState::SecondRangeInput
                } else {
                    FlowState::ImageSelected
                };
                self.transition(&mut inner, fallback);
                self.emit(FlowEvent::Error(FlowError::Transport(err.to_string())));
            }
        }
    }

    /// Terminal housekeeping: overlay, confetti, best-effort feedback, and
    /// the timed trip back to `Idle`.
    async fn enter_terminal(
        &self,
        inner: &mut ControllerInner,
        modal: ModalId,
        burst: BurstKind,
        record: Option<FeedbackRecord>,
        reset_delay: Duration,
    ) {
        self.modals.show(modal).await;
        self.particles.trigger(burst);
        if let Some(record) = record {
            self.send_feedback(record);
        }
        self.schedule_auto_reset(inner, reset_delay);
    }

    fn send_feedback(&self, record: FeedbackRecord) {
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(err) = provider.submit_feedback(&record).await {
                warn!(error = %err, "feedback submission failed");
            }
        });
    }

    fn schedule_auto_reset(&self, inner: &mut ControllerInner, delay: Duration) {
        Self::cancel_auto_reset(inner);
        let controller = self.clone();
        inner.auto_reset = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            debug!("auto-reset timer fired");
            {
                // This timer is done; drop its own handle so the reset
                // below cannot abort the task running it.
                let mut inner = controller.inner.lock().await;
                inner.auto_reset = None;
            }
            controller.reset().await;
        }));
    }

    fn cancel_auto_reset(inner: &mut ControllerInner) {
        if let Some(handle) = inner.auto_reset.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
