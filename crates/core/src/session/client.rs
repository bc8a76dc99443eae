//! Per-stream client slot table and session watchdog.

use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Client slots per stream. Slot 0 is the stream owner: tearing it down
/// tears the whole stream down.
pub const MAX_CLIENTS: usize = 8;

/// Grace added on top of the session timeout before the watchdog
/// declares a client dead.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(15);

/// Default RTSP session timeout advertised in `Session: ...;timeout=`.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// One attached RTSP client.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// 10-digit decimal session ID.
    pub session_id: String,
    /// Last CSeq seen from this client.
    pub cseq: u32,
    /// Client address, fixed at attach time.
    pub ip: IpAddr,
    /// Negotiated RTP destination port (SETUP `client_port=`).
    pub rtp_port: u16,
    /// RTCP destination port, RTP port + 1.
    pub rtcp_port: u16,
    pub session_timeout: Duration,
    /// Deadline after which the client counts as gone; `None` while the
    /// watchdog is disarmed (before the first session-bearing request).
    watchdog: Option<Instant>,
    /// Whether the current request lets the connection close without
    /// tearing the session down (everything except SETUP, plus any
    /// request that carried no Session header).
    pub can_close: bool,
}

impl SessionRecord {
    pub fn new(session_id: String, ip: IpAddr, session_timeout: Duration) -> Self {
        Self {
            session_id,
            cseq: 0,
            ip,
            rtp_port: 0,
            rtcp_port: 0,
            session_timeout,
            watchdog: None,
            can_close: true,
        }
    }

    /// Arm or re-arm the watchdog from `now`.
    pub fn restart_watchdog_at(&mut self, now: Instant) {
        self.watchdog = Some(now + self.session_timeout + WATCHDOG_GRACE);
    }

    pub fn restart_watchdog(&mut self) {
        self.restart_watchdog_at(Instant::now());
    }

    pub fn expired_at(&self, now: Instant) -> bool {
        self.watchdog.is_some_and(|deadline| now >= deadline)
    }

    /// Set the RTP destination port; RTCP is always the next port up.
    /// Returns `false` and leaves both ports unchanged when no next
    /// port exists (RTP port 65535).
    pub fn set_rtp_port(&mut self, port: u16) -> bool {
        let Some(rtcp_port) = port.checked_add(1) else {
            return false;
        };
        self.rtp_port = port;
        self.rtcp_port = rtcp_port;
        true
    }
}

/// Fixed table of [`MAX_CLIENTS`] optional client slots.
#[derive(Debug, Default)]
pub struct ClientTable {
    slots: [Option<SessionRecord>; MAX_CLIENTS],
}

impl ClientTable {
    /// Claim the first free slot. Returns the slot index.
    pub fn claim_free(&mut self, record: SessionRecord) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(record);
        Some(slot)
    }

    /// Find the slot bound to an RTSP session ID.
    pub fn find_for_session(&self, session_id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|record| record.session_id == session_id)
        })
    }

    pub fn get(&self, client_id: usize) -> Option<&SessionRecord> {
        self.slots.get(client_id)?.as_ref()
    }

    pub fn get_mut(&mut self, client_id: usize) -> Option<&mut SessionRecord> {
        self.slots.get_mut(client_id)?.as_mut()
    }

    /// Clear one slot, returning its record.
    pub fn release(&mut self, client_id: usize) -> Option<SessionRecord> {
        self.slots.get_mut(client_id)?.take()
    }

    /// Slots whose watchdog deadline has passed.
    pub fn expired_slots_at(&self, now: Instant) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|r| r.expired_at(now)))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(
            id.to_string(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            DEFAULT_SESSION_TIMEOUT,
        )
    }

    #[test]
    fn claims_first_free_slot() {
        let mut table = ClientTable::default();
        assert_eq!(table.claim_free(record("0000000001")), Some(0));
        assert_eq!(table.claim_free(record("0000000002")), Some(1));

        table.release(0);
        assert_eq!(table.claim_free(record("0000000003")), Some(0));
    }

    #[test]
    fn full_table_rejects() {
        let mut table = ClientTable::default();
        for i in 0..MAX_CLIENTS {
            assert!(table.claim_free(record(&format!("{i:010}"))).is_some());
        }
        assert_eq!(table.claim_free(record("9999999999")), None);
    }

    #[test]
    fn finds_by_session_id() {
        let mut table = ClientTable::default();
        table.claim_free(record("0000000001"));
        table.claim_free(record("0000000002"));
        assert_eq!(table.find_for_session("0000000002"), Some(1));
        assert_eq!(table.find_for_session("0000000009"), None);
    }

    #[test]
    fn watchdog_fires_after_timeout_plus_grace() {
        let mut rec = record("0000000001");
        let now = Instant::now();
        assert!(!rec.expired_at(now), "disarmed watchdog never expires");

        rec.restart_watchdog_at(now);
        assert!(!rec.expired_at(now + DEFAULT_SESSION_TIMEOUT));
        assert!(rec.expired_at(now + DEFAULT_SESSION_TIMEOUT + WATCHDOG_GRACE));
    }

    #[test]
    fn expired_slots_reported() {
        let mut table = ClientTable::default();
        table.claim_free(record("0000000001"));
        table.claim_free(record("0000000002"));
        let now = Instant::now();
        table.get_mut(0).unwrap().restart_watchdog_at(now);

        let later = now + DEFAULT_SESSION_TIMEOUT + WATCHDOG_GRACE + Duration::from_secs(1);
        assert_eq!(table.expired_slots_at(later), vec![0]);
    }

    #[test]
    fn rtcp_port_follows_rtp_port() {
        let mut rec = record("0000000001");
        assert!(rec.set_rtp_port(51354));
        assert_eq!(rec.rtp_port, 51354);
        assert_eq!(rec.rtcp_port, 51355);
    }

    #[test]
    fn top_rtp_port_has_no_rtcp_port() {
        let mut rec = record("0000000001");
        assert!(!rec.set_rtp_port(u16::MAX));
        assert_eq!(rec.rtp_port, 0);
        assert_eq!(rec.rtcp_port, 0);
    }
}
