//! Interaction state machine for the age-guess flow.
//!
//! The controller owns the session, sequences the prediction client, modal
//! manager, and particle engine, and is the only component that mutates
//! flow state; front ends bind their controls to the intent methods and
//! subscribe to the event stream.

pub mod controller;
pub mod events;
pub mod modal;
pub mod session;

pub use controller::{FlowConfig, FlowController};
pub use events::FlowEvent;
pub use modal::ModalManager;
pub use session::{FlowState, Session};
