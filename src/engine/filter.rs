use super::rules::RuleStore;
use super::state::FilterStateStore;
use crate::audit::{AuditLog, TrafficEntry};
use crate::block_page::BlockPageRenderer;
use crate::flow::{ExchangeState, Flow, Response, Verdict};
use crate::notifier::{ChangeNotifier, FilteringStatusChanged};
use crate::stats::FilterStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Allow/block decisions for intercepted requests and the audit record for
/// each completed exchange.
///
/// Constructed once at startup; every exchange is independent and the engine
/// is shared by reference across concurrent callbacks.
pub struct FilterEngine {
    rules: Arc<RuleStore>,
    state: Arc<FilterStateStore>,
    renderer: Arc<BlockPageRenderer>,
    audit: Arc<dyn AuditLog>,
    notifier: ChangeNotifier,
    stats: Arc<FilterStats>,
}

impl FilterEngine {
    pub fn new(
        rules: Arc<RuleStore>,
        state: Arc<FilterStateStore>,
        renderer: Arc<BlockPageRenderer>,
        audit: Arc<dyn AuditLog>,
        stats: Arc<FilterStats>,
    ) -> Self {
        let notifier = state.notifier().clone();
        Self {
            rules,
            state,
            renderer,
            audit,
            notifier,
            stats,
        }
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn state(&self) -> &Arc<FilterStateStore> {
        &self.state
    }

    pub fn renderer(&self) -> &Arc<BlockPageRenderer> {
        &self.renderer
    }

    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    pub fn stats(&self) -> &Arc<FilterStats> {
        &self.stats
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FilteringStatusChanged> {
        self.notifier.subscribe()
    }

    /// Picks up rule/state file changes. Cheap when nothing changed.
    pub fn refresh(&self) {
        if self.rules.refresh() {
            self.stats.inc_rule_reloads();
        }
        let was_enabled = self.state.snapshot().enabled;
        if self.state.refresh() {
            self.stats.inc_state_reloads();
            // Toggles made by another process surface here, not on the notifier.
            let enabled = self.state.snapshot().enabled;
            if enabled != was_enabled {
                info!(
                    "Filtering {} by an external change.",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
        }
    }

    /// Decision for `host` against the current configuration, without
    /// touching any flow or the audit log.
    pub fn decide(&self, host: &str) -> Verdict {
        self.refresh();

        if !self.state.snapshot().enabled {
            return Verdict::Allowed;
        }

        let host = normalize_host(host);
        let rules = self.rules.snapshot();
        match rules.find_match(&host) {
            Some(rule) => Verdict::Blocked { rule: rule.into() },
            None => Verdict::Allowed,
        }
    }

    /// Request callback. On a block, attaches a synthetic 403 block page to
    /// the flow so the host answers without contacting the upstream.
    pub fn on_request(&self, flow: &mut Flow) -> Verdict {
        if let ExchangeState::Decided(verdict) = flow.state() {
            return verdict.clone();
        }
        if !matches!(flow.state(), ExchangeState::Pending) {
            return Verdict::Allowed;
        }

        let verdict = self.decide(&flow.request.host);

        if let Verdict::Blocked { rule } = &verdict {
            let host = normalize_host(&flow.request.host);
            info!(
                "BLOCKED: {} (Reason: Matched domain '{}')",
                flow.request.url, rule
            );
            self.stats.inc_blocked();

            let reason = format!(
                "the domain '{}' is on the block list (matched rule: '{}')",
                host, rule
            );
            let html = self.renderer.render(&reason, &flow.request.url);
            flow.response = Some(Response::forbidden_html(html));
        }

        flow.set_state(ExchangeState::Decided(verdict.clone()));
        verdict
    }

    /// Response callback. Appends exactly one audit record per flow; storage
    /// failures are logged and never reach the exchange.
    pub fn on_response(&self, flow: &mut Flow) {
        let is_blocked = match flow.state() {
            ExchangeState::Logged { .. } => {
                debug!("Exchange for {} already logged", flow.request.url);
                return;
            }
            ExchangeState::Decided(verdict) => verdict.is_blocked(),
            // Never seen by on_request: infer from the response shape.
            ExchangeState::Pending => flow
                .response
                .as_ref()
                .is_some_and(Response::looks_like_block_page),
        };

        let status_code = flow.response.as_ref().map_or(0, |r| r.status);
        let entry = TrafficEntry::new(
            flow.client_ip.to_string(),
            flow.request.method.clone(),
            flow.request.url.clone(),
            status_code,
            is_blocked,
        );

        self.stats.inc_exchanges();
        if let Err(e) = self.audit.append(entry) {
            self.stats.inc_audit_failures();
            error!("Failed to log request to audit log: {}", e);
        }

        flow.set_state(ExchangeState::Logged {
            blocked: is_blocked,
        });
    }

    /// Refreshes rules and state every `interval` in the background, in
    /// addition to the refresh done on each request.
    pub fn spawn_reload_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || engine.refresh()).await {
                    error!("Reload task failed: {}", e);
                }
            }
        })
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}
