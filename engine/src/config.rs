//! Engine tuning knobs.
//!
//! Defaults match the deployed behavior: a 30s channel keepalive, a 15s
//! presence heartbeat while a session is open, and a capped, fixed
//! reconnect delay that shortens while a call is active. Tests construct
//! their own config when they need tighter timing.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Channel keepalive interval (`ping`).
    pub channel_heartbeat: Duration,
    /// Presence/attendance heartbeat interval while a session is open.
    pub presence_heartbeat: Duration,
    /// Reconnect delay after an unexpected channel closure during a call.
    pub reconnect_delay_in_call: Duration,
    /// Reconnect delay when no call is active.
    pub reconnect_delay_idle: Duration,
    /// Minimum spacing between typing-preview broadcasts.
    pub typing_min_interval_ms: i64,
    /// How long a received typing preview stays visible after its last
    /// update.
    pub typing_expiry_ms: i64,
    /// How long a remote cursor mark stays visible after its last update.
    pub cursor_expiry_ms: i64,
    /// Vertical step used when searching for a free text slot.
    pub text_shift_step: f64,
    /// Attempt budget for the text slot search before falling back.
    pub text_place_attempts: usize,
    /// Page height used by the slot search wrap rule.
    pub page_height: f64,
    /// How long a departed participant counts as a "recent leaver" for
    /// reconnect auto-accept.
    pub recent_leaver_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_heartbeat: Duration::from_secs(30),
            presence_heartbeat: Duration::from_secs(15),
            reconnect_delay_in_call: Duration::from_secs(1),
            reconnect_delay_idle: Duration::from_secs(5),
            typing_min_interval_ms: 100,
            typing_expiry_ms: 2_000,
            cursor_expiry_ms: 6_000,
            text_shift_step: 24.0,
            text_place_attempts: 16,
            page_height: 1_080.0,
            recent_leaver_ms: 300_000,
        }
    }
}
