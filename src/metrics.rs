use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, register_int_gauge};
use prometheus::{IntCounter, IntCounterVec, IntGauge};

lazy_static! {
    pub static ref REWRITE_PASSES: IntCounter = register_int_counter!(
        "iptv_proxy_rewrite_passes_total",
        "Completed playlist rewrite passes"
    )
    .unwrap();
    pub static ref TRACKS_DROPPED: IntCounter = register_int_counter!(
        "iptv_proxy_tracks_dropped_total",
        "Tracks dropped because their upstream URL could not be rewritten"
    )
    .unwrap();
    pub static ref ROUTES_INSTALLED: IntGauge = register_int_gauge!(
        "iptv_proxy_routes_installed",
        "Track routes in the live route table"
    )
    .unwrap();
    pub static ref UPSTREAM_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "iptv_proxy_upstream_requests_total",
        "Requests forwarded upstream by kind",
        &["kind"]
    )
    .unwrap();
}
