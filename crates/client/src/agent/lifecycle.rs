//! Install and activate: the precache installer and generation reaper.

use std::fmt;

use serde::Serialize;
use tether_core::{Error, GenerationKind, HttpResponse};

use super::{Agent, Effect, Outcome};
use crate::fetch::NetworkRequest;

/// Where the agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; a new install may be attempted.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

impl Agent {
    /// Move from one of `from` to `to`, failing with `INVALID_STATE` otherwise.
    async fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<(), Error> {
        let mut state = self.inner.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot move from {} to {}", *state, to)));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: LifecycleState) {
        *self.inner.state.write().await = to;
    }

    pub(crate) async fn install(&self) -> Result<Outcome, Error> {
        self.transition(&[LifecycleState::Parsed, LifecycleState::Redundant], LifecycleState::Installing)
            .await?;

        match self.precache().await {
            Ok(count) => {
                self.set_state(LifecycleState::Installed).await;
                tracing::info!(
                    generation = self.inner.generations.static_name(),
                    entries = count,
                    "installed"
                );
                Ok(Outcome::effect(Effect::SkipWaiting))
            }
            Err(err) => {
                self.set_state(LifecycleState::Redundant).await;
                tracing::warn!(error = %err, "install failed");
                Err(err)
            }
        }
    }

    /// Fetch the whole manifest, then write it in one transaction.
    ///
    /// Any failed or non-2xx fetch aborts before the store is touched.
    async fn precache(&self) -> Result<usize, Error> {
        let mut fetched: Vec<(String, HttpResponse)> = Vec::with_capacity(self.inner.manifest.len());

        for url in &self.inner.manifest {
            let response = self
                .inner
                .network
                .fetch(&NetworkRequest::get(url.clone()))
                .await
                .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;

            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{url}: status {}", response.status)));
            }

            fetched.push((url.to_string(), response));
        }

        let generations = &self.inner.generations;
        let written = self
            .inner
            .db
            .populate_generation(generations.static_name(), GenerationKind::Static, fetched)
            .await?;
        self.inner
            .db
            .create_generation(generations.dynamic_name(), GenerationKind::Dynamic)
            .await?;

        Ok(written)
    }

    pub(crate) async fn activate(&self) -> Result<Outcome, Error> {
        self.transition(&[LifecycleState::Installed], LifecycleState::Activating).await?;

        match self.reap().await {
            Ok(reaped) => {
                self.set_state(LifecycleState::Activated).await;
                tracing::info!(
                    generation = self.inner.generations.static_name(),
                    reaped = reaped.len(),
                    "activated"
                );
                Ok(Outcome { effects: vec![Effect::ClaimClients], reaped, ..Default::default() })
            }
            Err(err) => {
                self.set_state(LifecycleState::Installed).await;
                tracing::warn!(error = %err, "activation failed");
                Err(err)
            }
        }
    }

    /// Delete every generation but the current pair.
    async fn reap(&self) -> Result<Vec<String>, Error> {
        let generations = &self.inner.generations;
        let reaped = self.inner.db.retain_generations(&generations.lookup_order()).await?;
        for name in &reaped {
            tracing::info!(generation = %name, "deleted stale generation");
        }

        self.inner
            .db
            .create_generation(generations.dynamic_name(), GenerationKind::Dynamic)
            .await?;

        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ScriptedNetwork, agent_with, shell_network};
    use super::super::{Effect, Event};
    use super::*;

    #[tokio::test]
    async fn test_install_then_activate() {
        let (agent, db) = agent_with(shell_network()).await;

        let outcome = agent.dispatch(Event::Install).await.unwrap();
        assert_eq!(outcome.effects, vec![Effect::SkipWaiting]);
        assert_eq!(agent.state().await, LifecycleState::Installed);
        assert_eq!(db.count_entries("static-v1").await.unwrap(), 3);
        assert!(db.has_generation("dynamic-v1").await.unwrap());

        let outcome = agent.dispatch(Event::Activate).await.unwrap();
        assert_eq!(outcome.effects, vec![Effect::ClaimClients]);
        assert!(outcome.reaped.is_empty());
        assert_eq!(agent.state().await, LifecycleState::Activated);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let (agent, _) = agent_with(shell_network()).await;
        let result = agent.dispatch(Event::Activate).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(agent.state().await, LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let (agent, _) = agent_with(shell_network()).await;
        agent.dispatch(Event::Install).await.unwrap();
        assert!(matches!(agent.dispatch(Event::Install).await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant_and_retryable() {
        let network = shell_network();
        network.offline(true);
        let (agent, db) = agent_with(network.clone()).await;

        let err = agent.dispatch(Event::Install).await.unwrap_err();
        assert!(err.to_string().starts_with("INSTALL_FAILED: https://app.test/"));
        assert_eq!(agent.state().await, LifecycleState::Redundant);
        assert!(db.generation_names().await.unwrap().is_empty());
        assert!(matches!(agent.dispatch(Event::Activate).await, Err(Error::InvalidState(_))));

        network.offline(false);
        agent.dispatch(Event::Install).await.unwrap();
        assert_eq!(agent.state().await, LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let network = ScriptedNetwork::new();
        network.html("https://app.test/", "<html>shell</html>");
        network.html("https://app.test/offline.html", "<html>offline</html>");
        // manifest.json is unrouted and answers 404.
        let (agent, db) = agent_with(network).await;

        let err = agent.dispatch(Event::Install).await.unwrap_err();
        assert_eq!(err.to_string(), "INSTALL_FAILED: https://app.test/manifest.json: status 404");
        assert_eq!(db.count_entries("static-v1").await.unwrap(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Activating.to_string(), "activating");
        assert_eq!(serde_json::to_value(LifecycleState::Redundant).unwrap(), "redundant");
    }
}
