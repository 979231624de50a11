//! Mutation replay queue.
//!
//! Writes that failed while offline are queued and replayed in FIFO order
//! on a reconnect signal. A record is only removed once the origin accepts
//! it with a 2xx status. Replay is at-least-once.

use std::time::Duration;

use serde::Serialize;
use tether_core::{Error, MutationRecord};

use super::Agent;
use crate::fetch::NetworkRequest;

/// Result of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Records accepted by the origin and removed.
    pub replayed: usize,
    /// Records that were attempted and kept.
    pub failed: usize,
    /// Records still backing off.
    pub skipped: usize,
    /// Records left in the queue after the drain.
    pub remaining: u64,
}

/// Delay before attempt `attempts + 1`: `min(base * 2^(attempts-1), max)`.
pub fn backoff_delay(base: Duration, max: Duration, attempts: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}

impl Agent {
    /// Append a failed write to the queue. Returns the record id.
    pub async fn queue_mutation(&self, record: MutationRecord) -> Result<String, Error> {
        self.inner.db.enqueue_mutation(&record).await?;
        tracing::info!(id = %record.id, method = %record.method, url = %record.url, "queued mutation");
        Ok(record.id)
    }

    /// Drain the queue once.
    pub(crate) async fn replay(&self) -> Result<ReplayReport, Error> {
        let _drain = self.inner.drain.lock().await;
        let mut report = ReplayReport::default();
        let now = chrono::Utc::now().timestamp_millis();

        for record in self.inner.db.pending_mutations().await? {
            if !record.is_due(now) {
                report.skipped += 1;
                continue;
            }

            let request = match NetworkRequest::try_from(&record) {
                Ok(request) => request,
                Err(err) => {
                    self.reject(&record, &err.to_string(), now).await?;
                    report.failed += 1;
                    continue;
                }
            };

            match self.inner.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.inner.db.remove_mutation(&record.id).await?;
                    tracing::info!(id = %record.id, status = response.status, "replayed mutation");
                    report.replayed += 1;
                }
                Ok(response) => {
                    self.reject(&record, &format!("status {}", response.status), now).await?;
                    report.failed += 1;
                }
                Err(err) => {
                    self.inner
                        .db
                        .record_mutation_failure(&record.id, &err.to_string(), None)
                        .await?;
                    tracing::debug!(id = %record.id, error = %err, "still offline; stopping replay");
                    report.failed += 1;
                    break;
                }
            }
        }

        report.remaining = self.inner.db.count_mutations().await?;
        tracing::info!(
            replayed = report.replayed,
            failed = report.failed,
            skipped = report.skipped,
            remaining = report.remaining,
            "replay finished"
        );
        Ok(report)
    }

    /// Keep a record the origin refused and push its next attempt out.
    async fn reject(&self, record: &MutationRecord, reason: &str, now: i64) -> Result<(), Error> {
        let config = &self.inner.replay;
        let delay = backoff_delay(config.backoff_base(), config.backoff_max(), record.attempts + 1);
        let next_attempt_at = now.saturating_add(delay.as_millis() as i64);

        tracing::warn!(id = %record.id, reason, retry_in_ms = delay.as_millis() as u64, "mutation replay rejected");
        self.inner
            .db
            .record_mutation_failure(&record.id, reason, Some(next_attempt_at))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ScriptedNetwork, agent_with};
    use super::super::Event;
    use super::*;
    use tether_core::HttpResponse;

    fn post(url: &str) -> MutationRecord {
        MutationRecord::new(url, "POST", vec![("content-type".into(), "application/json".into())], Some(b"{}".to_vec()))
    }

    async fn sync(agent: &Agent) -> ReplayReport {
        agent
            .dispatch(Event::Sync { tag: "sync-mutations".into() })
            .await
            .unwrap()
            .replay
            .unwrap()
    }

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, max, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, max, 2), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, max, 4), Duration::from_secs(40));
        assert_eq!(backoff_delay(base, max, 5), max);
        assert_eq!(backoff_delay(base, max, 200), max);
    }

    #[tokio::test]
    async fn test_replay_in_fifo_order() {
        let network = ScriptedNetwork::new();
        network.route("https://app.test/api/a", HttpResponse::new(201, Vec::new(), ""));
        network.route("https://app.test/api/b", HttpResponse::new(204, Vec::new(), ""));
        let (agent, db) = agent_with(network.clone()).await;

        agent.queue_mutation(post("https://app.test/api/a")).await.unwrap();
        agent.queue_mutation(post("https://app.test/api/b")).await.unwrap();

        let report = sync(&agent).await;
        assert_eq!(report, ReplayReport { replayed: 2, failed: 0, skipped: 0, remaining: 0 });
        let urls: Vec<String> = network.calls().iter().map(|c| c.url.to_string()).collect();
        assert_eq!(urls, vec!["https://app.test/api/a", "https://app.test/api/b"]);
        assert_eq!(network.calls()[0].method, "POST");
        assert_eq!(db.count_mutations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_replay_backs_off_and_continues() {
        let network = ScriptedNetwork::new();
        network.route("https://app.test/api/a", HttpResponse::new(500, Vec::new(), "boom"));
        network.route("https://app.test/api/b", HttpResponse::new(200, Vec::new(), ""));
        let (agent, db) = agent_with(network.clone()).await;

        agent.queue_mutation(post("https://app.test/api/a")).await.unwrap();
        agent.queue_mutation(post("https://app.test/api/b")).await.unwrap();

        let report = sync(&agent).await;
        assert_eq!(report, ReplayReport { replayed: 1, failed: 1, skipped: 0, remaining: 1 });

        let pending = db.pending_mutations().await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("status 500"));
        assert!(pending[0].next_attempt_at.is_some());

        // Backing off: the next drain skips it without a network call.
        let calls = network.calls().len();
        let report = sync(&agent).await;
        assert_eq!(report, ReplayReport { replayed: 0, failed: 0, skipped: 1, remaining: 1 });
        assert_eq!(network.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_offline_stops_drain_without_backoff() {
        let network = ScriptedNetwork::new();
        network.offline(true);
        let (agent, db) = agent_with(network.clone()).await;

        agent.queue_mutation(post("https://app.test/api/a")).await.unwrap();
        agent.queue_mutation(post("https://app.test/api/b")).await.unwrap();

        let report = sync(&agent).await;
        assert_eq!(report, ReplayReport { replayed: 0, failed: 1, skipped: 0, remaining: 2 });
        assert_eq!(network.calls().len(), 1);

        let pending = db.pending_mutations().await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].next_attempt_at, None);
        assert_eq!(pending[1].attempts, 0);
    }
}
