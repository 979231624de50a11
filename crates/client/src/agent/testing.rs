//! Test doubles for driving the agent without a real network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_core::{AppConfig, CacheDb, HttpResponse};

use super::Agent;
use crate::fetch::{FetchError, Network, NetworkRequest};

#[derive(Default)]
struct Script {
    routes: HashMap<String, HttpResponse>,
    offline: bool,
    calls: Vec<NetworkRequest>,
}

/// A network answering from a fixed route table.
///
/// Unrouted URLs answer 404. While offline every fetch fails with a
/// transport error. Clones share the same script.
#[derive(Clone, Default)]
pub(crate) struct ScriptedNetwork {
    script: Arc<Mutex<Script>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, response: HttpResponse) {
        self.script.lock().unwrap().routes.insert(url.to_string(), response);
    }

    pub(crate) fn html(&self, url: &str, body: &str) {
        self.route(url, HttpResponse::new(200, vec![("content-type".into(), "text/html".into())], body.to_string()));
    }

    pub(crate) fn offline(&self, offline: bool) {
        self.script.lock().unwrap().offline = offline;
    }

    pub(crate) fn calls(&self) -> Vec<NetworkRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    pub(crate) fn call_count(&self, url: &str) -> usize {
        self.script.lock().unwrap().calls.iter().filter(|c| c.url.as_str() == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &NetworkRequest) -> Result<HttpResponse, FetchError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(request.clone());
        if script.offline {
            return Err(FetchError::Network("offline".into()));
        }
        Ok(script
            .routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, Vec::new(), "not found")))
    }
}

pub(crate) fn test_config() -> AppConfig {
    AppConfig { origin: "https://app.test".into(), ..Default::default() }
}

/// A network serving the default application shell.
pub(crate) fn shell_network() -> ScriptedNetwork {
    let network = ScriptedNetwork::new();
    network.html("https://app.test/", "<html>shell</html>");
    network.html("https://app.test/offline.html", "<html>offline</html>");
    network.route(
        "https://app.test/manifest.json",
        HttpResponse::new(200, vec![("content-type".into(), "application/manifest+json".into())], "{}"),
    );
    network
}

pub(crate) async fn agent_with(network: ScriptedNetwork) -> (Agent, CacheDb) {
    agent_for(&test_config(), network).await
}

pub(crate) async fn agent_for(config: &AppConfig, network: ScriptedNetwork) -> (Agent, CacheDb) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let agent = Agent::new(config, db.clone(), Arc::new(network)).unwrap();
    (agent, db)
}
