//! Client code for tether.
//!
//! This crate provides the offline caching agent (request classification,
//! strategy executors, install/activate, replay queue, notifications and
//! control messages) and the network seam it fetches through.

pub mod agent;
pub mod fetch;

pub use agent::{
    Agent, Classifier, ControlMessage, Effect, Event, LifecycleState, Notification, Outcome, ReplayReport, Strategy,
};

pub use fetch::{FetchConfig, FetchError, HttpNetwork, Network, NetworkRequest};
