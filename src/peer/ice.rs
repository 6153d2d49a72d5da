use crate::peer::types::IceCandidate;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
    Unknown,
}

impl CandidateKind {
    /// Reads the `typ` attribute of an SDP candidate line
    pub fn parse(candidate: &str) -> Self {
        let mut parts = candidate.split_whitespace();
        while let Some(part) = parts.next() {
            if part == "typ" {
                return match parts.next() {
                    Some("host") => CandidateKind::Host,
                    Some("srflx") => CandidateKind::ServerReflexive,
                    Some("prflx") => CandidateKind::PeerReflexive,
                    Some("relay") => CandidateKind::Relay,
                    _ => CandidateKind::Unknown,
                };
            }
        }
        CandidateKind::Unknown
    }
}

/// Running count of local candidates by type for one negotiation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateTally {
    pub host: usize,
    pub srflx: usize,
    pub prflx: usize,
    pub relay: usize,
    pub unknown: usize,
}

impl CandidateTally {
    pub fn record(&mut self, candidate: &IceCandidate) -> CandidateKind {
        let kind = CandidateKind::parse(&candidate.candidate);
        match kind {
            CandidateKind::Host => self.host += 1,
            CandidateKind::ServerReflexive => self.srflx += 1,
            CandidateKind::PeerReflexive => self.prflx += 1,
            CandidateKind::Relay => self.relay += 1,
            CandidateKind::Unknown => self.unknown += 1,
        }
        kind
    }

    pub fn total(&self) -> usize {
        self.host + self.srflx + self.prflx + self.relay + self.unknown
    }

    pub fn report(&self) {
        info!(
            host = self.host,
            srflx = self.srflx,
            prflx = self.prflx,
            relay = self.relay,
            unknown = self.unknown,
            "local candidate gathering finished"
        );
        if self.relay == 0 {
            warn!("no relay candidates gathered; check the ice server credentials");
        }
    }
}
