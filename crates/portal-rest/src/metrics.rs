//! Counters for portal traffic
//!
//! Recorded through the `metrics` facade. Without an installed recorder every
//! call is a no-op; exporting is the host's concern.

/// One finished logical call. `auth` is the path taken (`token` or
/// `webhook`), `outcome` is `success` or `failure`.
pub fn record_request(auth: &'static str, outcome: &'static str) {
    metrics::counter!("portal_requests_total", "auth" => auth, "outcome" => outcome)
        .increment(1);
}

/// One refresh-token grant. `outcome` is `success` or `failure`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("portal_token_refresh_total", "outcome" => outcome).increment(1);
}

/// One page requested by the pagination collector.
pub fn record_page() {
    metrics::counter!("portal_pages_fetched_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_request("token", "success");
        record_request("webhook", "failure");
        record_refresh("success");
        record_page();
    }
}
