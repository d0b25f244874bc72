use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SESSION_REFRESH_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static REVIEW_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let login_attempts = IntCounterVec::new(
        Opts::new("admin_login_attempts_total", "Admin login attempts by outcome"),
        &["outcome"],
    )?;
    let session_refresh = IntCounterVec::new(
        Opts::new(
            "admin_session_refresh_total",
            "Access token refresh calls by outcome",
        ),
        &["outcome"],
    )?;
    let review_decisions = IntCounterVec::new(
        Opts::new(
            "review_decisions_total",
            "Review decisions submitted by action and outcome",
        ),
        &["action", "outcome"],
    )?;

    registry.register(Box::new(login_attempts.clone()))?;
    registry.register(Box::new(session_refresh.clone()))?;
    registry.register(Box::new(review_decisions.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = LOGIN_ATTEMPTS_TOTAL.set(login_attempts);
    let _ = SESSION_REFRESH_TOTAL.set(session_refresh);
    let _ = REVIEW_DECISIONS_TOTAL.set(review_decisions);
    Ok(())
}

// Recording is a no-op until `init_metrics` has run (e.g. in unit tests).

pub fn record_login(outcome: &str) {
    if let Some(counter) = LOGIN_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_refresh(outcome: &str) {
    if let Some(counter) = SESSION_REFRESH_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_decision(action: &str, outcome: &str) {
    if let Some(counter) = REVIEW_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[action, outcome]).inc();
    }
}

pub fn get_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
