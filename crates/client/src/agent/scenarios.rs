//! End-to-end scenarios: install, activate, serve, deploy, replay.

use std::sync::Arc;

use bytes::Bytes;
use tether_core::{AppConfig, CacheDb, Destination, HttpResponse, RequestDescriptor, ResponseSource};
use url::Url;

use super::testing::{ScriptedNetwork, shell_network, test_config};
use super::{Agent, ControlMessage, Event, Outcome, Strategy};

fn url(path: &str) -> Url {
    Url::parse("https://app.test").unwrap().join(path).unwrap()
}

fn config(version: &str) -> AppConfig {
    AppConfig { version: version.into(), ..test_config() }
}

async fn activate_on(db: &CacheDb, config: &AppConfig, network: &ScriptedNetwork) -> (Agent, Outcome) {
    let agent = Agent::new(config, db.clone(), Arc::new(network.clone())).unwrap();
    agent.dispatch(Event::Install).await.unwrap();
    let outcome = agent.dispatch(Event::Activate).await.unwrap();
    (agent, outcome)
}

async fn activated(network: &ScriptedNetwork) -> (Agent, CacheDb) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let (agent, _) = activate_on(&db, &test_config(), network).await;
    (agent, db)
}

async fn fetch(agent: &Agent, req: RequestDescriptor) -> Outcome {
    agent.dispatch(Event::Fetch(req)).await.unwrap()
}

async fn respond(agent: &Agent, req: RequestDescriptor) -> HttpResponse {
    fetch(agent, req).await.response.unwrap()
}

#[tokio::test]
async fn reserved_prefixes_never_touch_the_cache() {
    let network = shell_network();
    network.route("https://app.test/api/posts", HttpResponse::new(200, Vec::new(), "[]"));
    let (agent, db) = activated(&network).await;
    db.put_entry("dynamic-v1", "https://app.test/api/posts", &HttpResponse::new(200, Vec::new(), "stale"))
        .await
        .unwrap();
    let calls = network.calls().len();

    for method in ["GET", "POST", "DELETE"] {
        let outcome = fetch(&agent, RequestDescriptor::get(url("/api/posts")).with_method(method)).await;
        assert_eq!(outcome.strategy, Some(Strategy::Bypass));
        assert!(outcome.response.is_none());
    }

    let outcome = fetch(&agent, RequestDescriptor::navigate(url("/socket.io/?EIO=4"))).await;
    assert!(outcome.response.is_none());

    assert_eq!(network.calls().len(), calls);
    let entry = db.match_entry("dynamic-v1", "https://app.test/api/posts").await.unwrap().unwrap();
    assert_eq!(entry.body, Bytes::from("stale"));
}

#[tokio::test]
async fn install_is_all_or_nothing() {
    let manifest: Vec<String> = (0..5).map(|i| format!("/shell/{i}.html")).collect();
    let config = AppConfig { manifest: manifest.clone(), offline_page: "/shell/0.html".into(), ..test_config() };

    let network = ScriptedNetwork::new();
    for path in &manifest {
        network.html(url(path).as_str(), path);
    }
    let db = CacheDb::open_in_memory().await.unwrap();
    let agent = Agent::new(&config, db.clone(), Arc::new(network.clone())).unwrap();
    agent.dispatch(Event::Install).await.unwrap();
    assert_eq!(db.count_entries("static-v1").await.unwrap(), 5);

    // One missing shell file fails the whole install.
    let network = ScriptedNetwork::new();
    for path in manifest.iter().filter(|p| !p.ends_with("3.html")) {
        network.html(url(path).as_str(), path);
    }
    let db = CacheDb::open_in_memory().await.unwrap();
    let agent = Agent::new(&config, db.clone(), Arc::new(network)).unwrap();
    assert!(agent.dispatch(Event::Install).await.is_err());
    assert_eq!(db.count_entries("static-v1").await.unwrap(), 0);
    assert!(db.generation_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn reinstalling_a_version_keeps_exactly_the_manifest() {
    let network = shell_network();
    network.html("https://app.test/legacy.html", "<html>legacy</html>");
    let db = CacheDb::open_in_memory().await.unwrap();

    let mut longer = test_config();
    longer.manifest.push("/legacy.html".into());
    activate_on(&db, &longer, &network).await;
    assert_eq!(db.count_entries("static-v1").await.unwrap(), 4);

    // Same version, shorter manifest, same store.
    activate_on(&db, &test_config(), &network).await;
    assert_eq!(db.count_entries("static-v1").await.unwrap(), 3);
    assert!(db.match_entry("static-v1", "https://app.test/legacy.html").await.unwrap().is_none());
}

#[tokio::test]
async fn successive_deploys_leave_only_the_current_pair() {
    let network = shell_network();
    let db = CacheDb::open_in_memory().await.unwrap();

    let (_, outcome) = activate_on(&db, &config("v1"), &network).await;
    assert!(outcome.reaped.is_empty());

    let (_, outcome) = activate_on(&db, &config("v2"), &network).await;
    assert_eq!(outcome.reaped, vec!["dynamic-v1".to_string(), "static-v1".to_string()]);

    let (_, outcome) = activate_on(&db, &config("v3"), &network).await;
    assert_eq!(outcome.reaped, vec!["dynamic-v2".to_string(), "static-v2".to_string()]);

    let mut live = db.generation_names().await.unwrap();
    live.sort();
    assert_eq!(live, vec!["dynamic-v3".to_string(), "static-v3".to_string()]);
}

#[tokio::test]
async fn activation_reaps_foreign_generations() {
    let network = shell_network();
    let db = CacheDb::open_in_memory().await.unwrap();
    db.create_generation("legacy-cache", tether_core::GenerationKind::Dynamic).await.unwrap();

    let (_, outcome) = activate_on(&db, &config("v1"), &network).await;
    assert_eq!(outcome.reaped, vec!["legacy-cache".to_string()]);
}

#[tokio::test]
async fn late_write_from_old_version_is_discarded() {
    let network = shell_network();
    network.route("https://app.test/data.json", HttpResponse::new(200, Vec::new(), "{}"));
    let db = CacheDb::open_in_memory().await.unwrap();

    let (old, _) = activate_on(&db, &config("v1"), &network).await;
    activate_on(&db, &config("v2"), &network).await;

    let response = respond(&old, RequestDescriptor::get(url("/data.json"))).await;
    assert_eq!(response.status, 200);
    assert!(!db.has_generation("dynamic-v1").await.unwrap());
}

#[tokio::test]
async fn cache_first_serves_stored_bytes_offline() {
    let image = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0, 1, 2, 255]);
    let network = shell_network();
    network.route(
        "https://app.test/uploads/avatar.png",
        HttpResponse::new(200, vec![("content-type".into(), "image/png".into())], image.clone()),
    );
    let (agent, _) = activated(&network).await;

    let first = respond(&agent, RequestDescriptor::get(url("/uploads/avatar.png"))).await;
    assert_eq!(first.source, ResponseSource::Network);

    network.offline(true);
    let cached = respond(&agent, RequestDescriptor::get(url("/uploads/avatar.png"))).await;
    assert_eq!(cached.source, ResponseSource::Cache);
    assert_eq!(cached.status, 200);
    assert_eq!(cached.body, image);
    assert_eq!(cached.content_type(), Some("image/png"));
}

#[tokio::test]
async fn cache_first_hit_skips_the_network() {
    let network = shell_network();
    network.route("https://app.test/media/clip.mp4", HttpResponse::new(200, Vec::new(), "clip"));
    let (agent, _) = activated(&network).await;

    respond(&agent, RequestDescriptor::get(url("/media/clip.mp4"))).await;
    respond(&agent, RequestDescriptor::get(url("/media/clip.mp4"))).await;
    assert_eq!(network.call_count("https://app.test/media/clip.mp4"), 1);
}

#[tokio::test]
async fn cache_first_miss_offline_is_a_network_error() {
    let network = shell_network();
    let (agent, _) = activated(&network).await;
    network.offline(true);

    let response = respond(&agent, RequestDescriptor::get(url("/img/new.png"))).await;
    assert_eq!(response, HttpResponse::network_error());
}

#[tokio::test]
async fn cache_first_does_not_store_errors() {
    let network = shell_network();
    let (agent, db) = activated(&network).await;

    let response = respond(&agent, RequestDescriptor::get(url("/img/missing.png"))).await;
    assert_eq!(response.status, 404);
    assert_eq!(db.count_entries("dynamic-v1").await.unwrap(), 0);
}

#[tokio::test]
async fn offline_navigation_gets_fallback_page() {
    let network = shell_network();
    network.html("https://app.test/dashboard", "<html>dashboard</html>");
    let (agent, db) = activated(&network).await;

    let online = respond(&agent, RequestDescriptor::navigate(url("/dashboard"))).await;
    assert_eq!(online.body, Bytes::from("<html>dashboard</html>"));

    network.offline(true);
    let offline = respond(&agent, RequestDescriptor::navigate(url("/dashboard"))).await;
    assert_eq!(offline.source, ResponseSource::OfflineFallback);
    assert_eq!(offline.body, Bytes::from("<html>offline</html>"));

    assert_eq!(db.count_entries("dynamic-v1").await.unwrap(), 0);
}

#[tokio::test]
async fn offline_navigation_without_fallback_is_503() {
    let network = shell_network();
    let (agent, db) = activated(&network).await;
    db.delete_generation("static-v1").await.unwrap();
    network.offline(true);

    let response = respond(&agent, RequestDescriptor::navigate(url("/settings"))).await;
    assert_eq!(response.status, 503);
    assert_eq!(response.error_body().unwrap().error, "OFFLINE");
}

#[tokio::test]
async fn network_first_refreshes_and_falls_back() {
    let network = shell_network();
    network.route("https://app.test/feed.json", HttpResponse::new(200, Vec::new(), "v1"));
    let (agent, db) = activated(&network).await;

    respond(&agent, RequestDescriptor::get(url("/feed.json"))).await;
    network.route("https://app.test/feed.json", HttpResponse::new(200, Vec::new(), "v2"));
    let fresh = respond(&agent, RequestDescriptor::get(url("/feed.json"))).await;
    assert_eq!(fresh.body, Bytes::from("v2"));
    let stored = db.match_entry("dynamic-v1", "https://app.test/feed.json").await.unwrap().unwrap();
    assert_eq!(stored.body, Bytes::from("v2"));

    network.offline(true);
    let cached = respond(&agent, RequestDescriptor::get(url("/feed.json"))).await;
    assert_eq!(cached.source, ResponseSource::Cache);
    assert_eq!(cached.body, Bytes::from("v2"));

    let missing = respond(&agent, RequestDescriptor::get(url("/other.json"))).await;
    assert_eq!(missing.status, 503);
    assert_eq!(missing.error_body().unwrap().error, "NETWORK_UNAVAILABLE");
}

#[tokio::test]
async fn network_first_reads_precached_shell() {
    let network = shell_network();
    let (agent, _) = activated(&network).await;
    network.offline(true);

    let manifest = respond(&agent, RequestDescriptor::get(url("/manifest.json"))).await;
    assert_eq!(manifest.source, ResponseSource::Cache);
    assert_eq!(manifest.body, Bytes::from("{}"));
}

#[tokio::test]
async fn html_for_a_script_is_never_cached() {
    let network = shell_network();
    let script = "https://app.test/_next/static/chunks/main.js";
    network.route(
        script,
        HttpResponse::new(200, vec![("content-type".into(), "application/javascript".into())], "run()"),
    );
    let (agent, db) = activated(&network).await;

    let good = respond(&agent, RequestDescriptor::get(url("/_next/static/chunks/main.js"))).await;
    assert_eq!(good.body, Bytes::from("run()"));

    // A redeploy serves the app shell for the stale chunk URL.
    network.route(
        script,
        HttpResponse::new(200, vec![("content-type".into(), "text/html; charset=utf-8".into())], "<html>"),
    );
    let guarded = respond(&agent, RequestDescriptor::get(url("/_next/static/chunks/main.js"))).await;
    assert_eq!(guarded.source, ResponseSource::Cache);
    assert_eq!(guarded.body, Bytes::from("run()"));

    let stored = db.match_entry("dynamic-v1", script).await.unwrap().unwrap();
    assert_eq!(stored.body, Bytes::from("run()"));
}

#[tokio::test]
async fn html_for_an_uncached_script_is_502() {
    let network = shell_network();
    network.html("https://app.test/worker-entry", "<html>");
    let (agent, db) = activated(&network).await;

    let req = RequestDescriptor::get(url("/worker-entry")).with_destination(Destination::Worker);
    let response = respond(&agent, req).await;
    assert_eq!(response.status, 502);
    assert_eq!(response.error_body().unwrap().error, "MIME_MISMATCH");
    assert_eq!(db.count_entries("dynamic-v1").await.unwrap(), 0);
}

#[tokio::test]
async fn non_script_assets_are_plain_network_first() {
    let network = shell_network();
    network.route(
        "https://app.test/assets/site.css",
        HttpResponse::new(200, vec![("content-type".into(), "text/css".into())], "body{}"),
    );
    let (agent, db) = activated(&network).await;

    let outcome = fetch(&agent, RequestDescriptor::get(url("/assets/site.css"))).await;
    assert_eq!(outcome.strategy, Some(Strategy::AssetMimeGuard));
    assert_eq!(outcome.response.unwrap().status, 200);
    assert_eq!(db.count_entries("dynamic-v1").await.unwrap(), 1);
}

#[tokio::test]
async fn queued_mutation_replays_exactly_once_after_reconnect() {
    let network = shell_network();
    network.route("https://app.test/api/posts", HttpResponse::new(201, Vec::new(), ""));
    let (agent, db) = activated(&network).await;

    let message = ControlMessage::from_value(serde_json::json!({
        "type": "QUEUE_MUTATION",
        "url": "/api/posts",
        "method": "POST",
        "body": "{\"title\":\"offline draft\"}"
    }))
    .unwrap();
    agent.dispatch(Event::Message(message)).await.unwrap();

    network.offline(true);
    let outcome = agent.dispatch(Event::Sync { tag: "sync-mutations".into() }).await.unwrap();
    assert_eq!(outcome.replay.unwrap().remaining, 1);

    network.offline(false);
    let outcome = agent.dispatch(Event::Sync { tag: "sync-mutations".into() }).await.unwrap();
    let report = outcome.replay.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(db.count_mutations().await.unwrap(), 0);

    let outcome = agent.dispatch(Event::Sync { tag: "sync-mutations".into() }).await.unwrap();
    assert_eq!(outcome.replay.unwrap().replayed, 0);

    let posts: Vec<_> = network
        .calls()
        .into_iter()
        .filter(|c| c.url.as_str() == "https://app.test/api/posts")
        .collect();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].body, Some(Bytes::from_static(b"{\"title\":\"offline draft\"}")));
}
