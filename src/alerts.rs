//! Alert emission and webhook fan-out.
//!
//! Alerts fan out three ways: a synchronous broadcast callback (dashboard
//! push), registered webhook endpoints (Slack/Discord/SIEM payloads), and
//! a bounded in-memory history. Webhook delivery never blocks the calling
//! pipeline: the endpoint list is copied under the lock and each delivery
//! runs on its own task with a hard deadline. Failures are logged and
//! swallowed; there is no retry.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::risk::watchlist::WatchlistHit;
use crate::risk::ThreatAssessment;

/// Bounded alert history size.
const MAX_HISTORY: usize = 1000;

/// Webhook delivery deadline.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// A structured security alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// "info"/"low"/"medium"/"high"/"critical"
    pub severity: String,
    /// "risk_assessment"/"watchlist_hit"/"compound"
    pub alert_type: String,
    pub title: String,
    pub description: String,
    pub txid: String,
    pub value: i64,
    pub assessment: Option<ThreatAssessment>,
    pub hits: Vec<WatchlistHit>,
}

/// A registered webhook receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub headers: HashMap<String, String>,
    /// Only alerts at or above this severity are delivered.
    pub min_severity: String,
}

/// Synchronous broadcast callback; must return promptly.
pub type BroadcastFn = Box<dyn Fn(&Alert) + Send + Sync>;

/// Alert lifecycle manager.
pub struct AlertManager {
    webhooks: RwLock<Vec<WebhookEndpoint>>,
    history: Mutex<Vec<Alert>>,
    http: reqwest::Client,
    broadcast: Option<BroadcastFn>,
}

impl AlertManager {
    pub fn new(broadcast: Option<BroadcastFn>) -> Self {
        Self {
            webhooks: RwLock::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            http: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .unwrap_or_default(),
            broadcast,
        }
    }

    /// Register a webhook endpoint with a minimum severity threshold.
    pub fn register_webhook(
        &self,
        name: &str,
        url: &str,
        min_severity: &str,
        headers: HashMap<String, String>,
    ) {
        let mut webhooks = self.webhooks.write().unwrap();
        webhooks.push(WebhookEndpoint {
            name: name.to_string(),
            url: url.to_string(),
            enabled: true,
            headers,
            min_severity: min_severity.to_string(),
        });
        info!(name, url, min_severity, "webhook registered");
    }

    /// Remove a webhook by name.
    pub fn remove_webhook(&self, name: &str) {
        self.webhooks.write().unwrap().retain(|w| w.name != name);
    }

    pub fn webhook_count(&self) -> usize {
        self.webhooks.read().unwrap().len()
    }

    /// Process and distribute an alert: record it, broadcast it, and
    /// dispatch matching webhooks asynchronously.
    pub fn emit(&self, mut alert: Alert) {
        if alert.id.is_empty() {
            alert.id = format!("{}-{}-{}", alert.severity, alert.alert_type, alert.txid);
        }

        // Record under the lock, copy the endpoint list, release before any
        // delivery so webhooks cannot backpressure the pipeline.
        {
            let mut history = self.history.lock().unwrap();
            history.push(alert.clone());
            if history.len() > MAX_HISTORY {
                let excess = history.len() - MAX_HISTORY;
                history.drain(..excess);
            }
        }
        let webhooks: Vec<WebhookEndpoint> = self.webhooks.read().unwrap().clone();

        if let Some(broadcast) = &self.broadcast {
            broadcast(&alert);
        }

        for webhook in webhooks {
            if !webhook.enabled {
                continue;
            }
            if !severity_meets_threshold(&alert.severity, &webhook.min_severity) {
                continue;
            }
            self.dispatch_webhook(webhook, alert.clone());
        }

        info!(
            severity = %alert.severity,
            alert_type = %alert.alert_type,
            txid = %alert.txid,
            "alert emitted"
        );
    }

    /// Build and emit an alert from a threat assessment. Info-level
    /// assessments never alert.
    pub fn emit_from_assessment(&self, assessment: ThreatAssessment, hits: Vec<WatchlistHit>) {
        if assessment.severity == "info" {
            return;
        }

        let mut alert_type = "risk_assessment";
        let mut title = format!("Risk assessment: {}", assessment.severity);

        if assessment.is_watchlist_hit {
            alert_type = "watchlist_hit";
            title = "Watchlist hit detected".to_string();
        }
        if assessment.is_coinjoin && assessment.is_watchlist_hit {
            alert_type = "compound";
            title = "Watchlisted funds entering CoinJoin mixer".to_string();
        }

        let value = (assessment.value_btc * 100_000_000.0) as i64;
        let alert = Alert {
            id: String::new(),
            timestamp: Utc::now(),
            severity: assessment.severity.clone(),
            alert_type: alert_type.to_string(),
            title,
            description: build_description(&assessment),
            txid: assessment.txid.clone(),
            value,
            assessment: Some(assessment),
            hits,
        };

        self.emit(alert);
    }

    /// Most recent alerts first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        let history = self.history.lock().unwrap();
        let take = if limit == 0 || limit > history.len() {
            history.len()
        } else {
            limit
        };
        history.iter().rev().take(take).cloned().collect()
    }

    /// Alerts matching a minimum severity.
    pub fn alerts_by_severity(&self, min_severity: &str) -> Vec<Alert> {
        let history = self.history.lock().unwrap();
        history
            .iter()
            .filter(|a| severity_meets_threshold(&a.severity, min_severity))
            .cloned()
            .collect()
    }

    /// Spawn-and-forget webhook delivery with the 5-second deadline. Only
    /// spawns when a tokio runtime is present; otherwise the delivery is
    /// skipped with a log line (unit tests, sync contexts).
    fn dispatch_webhook(&self, webhook: WebhookEndpoint, alert: Alert) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(name = %webhook.name, "no async runtime, webhook delivery skipped");
            return;
        };

        let client = self.http.clone();
        handle.spawn(async move {
            let mut request = client.post(&webhook.url).json(&alert);
            for (key, value) in &webhook.headers {
                request = request.header(key.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(resp) if resp.status().is_client_error() || resp.status().is_server_error() => {
                    warn!(name = %webhook.name, status = %resp.status(), "webhook returned error status");
                }
                Ok(_) => {}
                Err(e) => warn!(name = %webhook.name, error = %e, "webhook delivery failed"),
            }
        });
    }
}

/// Canonical severity order: info < low < medium < high < critical.
pub fn severity_rank(severity: &str) -> u8 {
    match severity {
        "low" => 1,
        "medium" => 2,
        "high" => 3,
        "critical" => 4,
        _ => 0,
    }
}

fn severity_meets_threshold(severity: &str, minimum: &str) -> bool {
    severity_rank(severity) >= severity_rank(minimum)
}

fn build_description(a: &ThreatAssessment) -> String {
    let mut desc = String::new();
    if a.is_watchlist_hit {
        desc.push_str("Transaction involves a watchlisted address. ");
    }
    if a.is_coinjoin {
        desc.push_str("CoinJoin mixing detected. ");
    }
    if a.value_btc > 1.0 {
        desc.push_str("High-value transaction. ");
    }
    if !a.signals.is_empty() {
        desc.push_str("Signals: ");
        desc.push_str(&a.signals.join(", "));
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn assessment(severity: &str, watchlist: bool, coinjoin: bool) -> ThreatAssessment {
        ThreatAssessment {
            txid: "alert_tx".into(),
            risk_score: 60,
            severity: severity.into(),
            signals: vec!["coinjoin_detected".into()],
            recommended_action: "alert".into(),
            is_watchlist_hit: watchlist,
            is_coinjoin: coinjoin,
            value_btc: 2.0,
        }
    }

    #[test]
    fn info_level_never_alerts() {
        let manager = AlertManager::new(None);
        manager.emit_from_assessment(assessment("info", false, false), vec![]);
        assert!(manager.recent_alerts(10).is_empty());
    }

    #[test]
    fn broadcast_callback_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        let manager = AlertManager::new(Some(Box::new(move |_alert| {
            counted.fetch_add(1, Ordering::SeqCst);
        })));

        manager.emit_from_assessment(assessment("high", false, false), vec![]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn alert_type_classification() {
        let manager = AlertManager::new(None);

        manager.emit_from_assessment(assessment("high", false, false), vec![]);
        manager.emit_from_assessment(assessment("high", true, false), vec![]);
        manager.emit_from_assessment(assessment("critical", true, true), vec![]);

        let alerts = manager.recent_alerts(3);
        assert_eq!(alerts[0].alert_type, "compound");
        assert_eq!(alerts[1].alert_type, "watchlist_hit");
        assert_eq!(alerts[2].alert_type, "risk_assessment");
    }

    #[test]
    fn alert_id_composed() {
        let manager = AlertManager::new(None);
        manager.emit_from_assessment(assessment("high", false, false), vec![]);
        let alerts = manager.recent_alerts(1);
        assert_eq!(alerts[0].id, "high-risk_assessment-alert_tx");
    }

    #[test]
    fn history_bounded() {
        let manager = AlertManager::new(None);
        for i in 0..1100 {
            let mut a = assessment("high", false, false);
            a.txid = format!("tx{i}");
            manager.emit_from_assessment(a, vec![]);
        }
        let all = manager.recent_alerts(0);
        assert_eq!(all.len(), 1000);
        // Oldest entries trimmed; newest kept.
        assert_eq!(all[0].txid, "tx1099");
    }

    #[test]
    fn severity_ordering() {
        assert!(severity_meets_threshold("critical", "high"));
        assert!(severity_meets_threshold("high", "high"));
        assert!(!severity_meets_threshold("medium", "high"));
        assert!(severity_meets_threshold("low", "info"));
        assert!(!severity_meets_threshold("info", "low"));
    }

    #[test]
    fn severity_filter() {
        let manager = AlertManager::new(None);
        manager.emit_from_assessment(assessment("low", false, false), vec![]);
        manager.emit_from_assessment(assessment("critical", false, false), vec![]);

        assert_eq!(manager.alerts_by_severity("high").len(), 1);
        assert_eq!(manager.alerts_by_severity("low").len(), 2);
    }

    #[test]
    fn webhook_registry() {
        let manager = AlertManager::new(None);
        manager.register_webhook("siem", "http://localhost/hook", "high", HashMap::new());
        assert_eq!(manager.webhook_count(), 1);
        manager.remove_webhook("siem");
        assert_eq!(manager.webhook_count(), 0);
    }

    #[test]
    fn description_mentions_signals() {
        let a = assessment("high", true, true);
        let desc = build_description(&a);
        assert!(desc.contains("watchlisted"));
        assert!(desc.contains("CoinJoin"));
        assert!(desc.contains("coinjoin_detected"));
    }
}
