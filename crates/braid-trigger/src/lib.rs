//! Braid Trigger
//!
//! Triggers are the alternate entry point into workflow execution: a
//! [`ScheduledTrigger`] launches a workflow on an interval, an
//! [`EventTrigger`] launches one per delivered event. Both fire through the
//! [`TriggerService`] they are registered with, which hands the launch to a
//! [`WorkflowLauncher`] such as [`EngineLauncher`].

mod error;
mod event;
mod launcher;
mod scheduled;
mod service;
mod trigger;

pub use error::TriggerError;
pub use event::EventTrigger;
pub use launcher::{EngineLauncher, WorkflowLauncher};
pub use scheduled::{DEFAULT_INTERVAL, MAX_INTERVAL, ScheduledTrigger, parse_schedule};
pub use service::{DIRECT_TRIGGER, TriggerService};
pub use trigger::{Trigger, TriggerSink};
