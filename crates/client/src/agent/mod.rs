//! The offline caching agent.
//!
//! An [`Agent`] sits between a web application and the network. The host
//! feeds it lifecycle, fetch, push, message and sync events through
//! [`Agent::dispatch`] and applies the returned [`Outcome`]: a list of
//! side effects plus, for fetches, the response to hand back.
//!
//! ### Lifecycle
//! `Parsed -> Installing -> Installed -> Activating -> Activated`, or
//! `Redundant` when the precache fails. Fetches are only intercepted once
//! the agent is `Activated`.
//!
//! ### Data flow
//! Every fetch passes through the [`Classifier`], which picks exactly one
//! strategy executor. Executors are the only code that reads or writes
//! cached entries; install and activate touch whole generations.

mod classify;
mod control;
mod lifecycle;
mod push;
mod replay;
mod strategy;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;
use tether_core::config::{NotificationConfig, ReplayConfig};
use tether_core::{AppConfig, CacheDb, Error, Generations, HttpResponse, RequestDescriptor};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::fetch::{Network, parse_origin, resolve};

pub use classify::{Classifier, Strategy, expects_script};
pub use control::ControlMessage;
pub use lifecycle::LifecycleState;
pub use push::{Notification, NotificationAction, NotificationData};
pub use replay::{ReplayReport, backoff_delay};

/// An event delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Install,
    Activate,
    Fetch(RequestDescriptor),
    /// Push message with its optional plain-text payload.
    Push(Option<String>),
    NotificationClick { action: Option<String> },
    Message(ControlMessage),
    Sync { tag: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch(_) => "fetch",
            Event::Push(_) => "push",
            Event::NotificationClick { .. } => "notificationclick",
            Event::Message(_) => "message",
            Event::Sync { .. } => "sync",
        }
    }
}

/// A host-visible side effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Promote the waiting agent without waiting for old clients to close.
    SkipWaiting,
    /// Take control of every open client.
    ClaimClients,
    ShowNotification { notification: Notification },
    CloseNotification,
    /// Focus an existing window at `url` or open a new one.
    OpenWindow { url: String },
    /// Reply to the sender of a control message.
    Reply { message: serde_json::Value },
}

/// Everything the host must apply after one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    /// Response for an intercepted fetch. `None` means not intercepted.
    pub response: Option<HttpResponse>,
    /// Strategy chosen for a fetch event.
    pub strategy: Option<Strategy>,
    pub replay: Option<ReplayReport>,
    /// Generations deleted during activation.
    pub reaped: Vec<String>,
}

impl Outcome {
    fn effect(effect: Effect) -> Self {
        Self { effects: vec![effect], ..Default::default() }
    }
}

struct Inner {
    db: CacheDb,
    network: Arc<dyn Network>,
    generations: Generations,
    classifier: Classifier,
    manifest: Vec<Url>,
    offline_page: Url,
    root: Url,
    notification: NotificationConfig,
    replay: ReplayConfig,
    state: RwLock<LifecycleState>,
    /// Serializes queue drains so one record is not replayed twice at once.
    drain: Mutex<()>,
}

/// Offline caching agent for one deployed build.
///
/// Cheap to clone; clones share the cache store and lifecycle state.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<Inner>,
}

impl Agent {
    /// Build an agent for the build described by `config`.
    ///
    /// Resolves the manifest, offline page and notification root against
    /// `config.origin`. The agent starts in `Parsed`.
    pub fn new(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin)?;
        let manifest = config
            .manifest
            .iter()
            .map(|path| resolve(&origin, path))
            .collect::<Result<Vec<_>, _>>()?;
        let offline_page = resolve(&origin, &config.offline_page)?;
        let root = resolve(&origin, "/")?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                network,
                generations: Generations::from_config(config),
                classifier: Classifier::new(origin, config),
                manifest,
                offline_page,
                root,
                notification: config.notification.clone(),
                replay: config.replay.clone(),
                state: RwLock::new(LifecycleState::Parsed),
                drain: Mutex::new(()),
            }),
        })
    }

    /// Handle one host event.
    ///
    /// Fetch, push and click events never fail; a network failure during a
    /// fetch is answered from cache or with a synthesized response.
    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        tracing::debug!(event = event.name(), "dispatch");
        match event {
            Event::Install => self.install().await,
            Event::Activate => self.activate().await,
            Event::Fetch(req) => Ok(self.on_fetch(req).await),
            Event::Push(payload) => Ok(self.on_push(payload.as_deref())),
            Event::NotificationClick { action } => Ok(self.on_notification_click(action.as_deref())),
            Event::Message(message) => self.on_message(message).await,
            Event::Sync { tag } => self.on_sync(&tag).await,
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        *self.inner.state.read().await
    }

    /// Current generation identifiers.
    pub fn generations(&self) -> &Generations {
        &self.inner.generations
    }

    pub fn classifier(&self) -> &Classifier {
        &self.inner.classifier
    }

    /// The cache store backing this agent.
    pub fn db(&self) -> &CacheDb {
        &self.inner.db
    }

    /// The application root, resolved against the origin.
    pub fn root(&self) -> &Url {
        &self.inner.root
    }

    async fn on_fetch(&self, req: RequestDescriptor) -> Outcome {
        let state = self.state().await;
        if state != LifecycleState::Activated {
            tracing::debug!(url = %req.url, %state, "not controlling clients; fetch passes through");
            return Outcome::default();
        }

        let strategy = self.inner.classifier.classify(&req);
        if strategy == Strategy::Bypass {
            tracing::debug!(method = %req.method, url = %req.url, "bypass");
            return Outcome { strategy: Some(strategy), ..Default::default() };
        }

        let response = self.execute(strategy, &req).await;
        tracing::debug!(
            url = %req.url,
            %strategy,
            status = response.status,
            source = %response.source,
            "fetch handled"
        );

        Outcome { response: Some(response), strategy: Some(strategy), ..Default::default() }
    }

    async fn on_sync(&self, tag: &str) -> Result<Outcome, Error> {
        if tag != self.inner.replay.sync_tag {
            tracing::debug!(tag, "ignoring sync tag");
            return Ok(Outcome::default());
        }

        let report = self.replay().await?;
        Ok(Outcome { replay: Some(report), ..Default::default() })
    }
}
