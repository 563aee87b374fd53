//! Peer discovery: three address sets (known good, currently connected,
//! known bad) populated from the configured seed list and from
//! `GetAddr`/`Addr` exchanges. The discovery loop dials from the good set
//! whenever connection count drops below `min_peers`, and re-solicits via
//! `GetAddr` when the good set itself runs dry.

use std::collections::HashSet;
use std::net::SocketAddr;

use parking_lot::RwLock;
use rand::seq::SliceRandom;

struct Sets {
    good: HashSet<SocketAddr>,
    connected: HashSet<SocketAddr>,
    bad: HashSet<SocketAddr>,
}

pub struct Discovery {
    sets: RwLock<Sets>,
}

impl Discovery {
    pub fn new(seed_list: &[SocketAddr]) -> Self {
        Self {
            sets: RwLock::new(Sets {
                good: seed_list.iter().copied().collect(),
                connected: HashSet::new(),
                bad: HashSet::new(),
            }),
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sets.read().connected.len()
    }

    pub fn is_connected(&self, addr: &SocketAddr) -> bool {
        self.sets.read().connected.contains(addr)
    }

    pub fn mark_connecting(&self, addr: SocketAddr) -> bool {
        let mut sets = self.sets.write();
        if sets.connected.contains(&addr) {
            return false;
        }
        sets.connected.insert(addr);
        true
    }

    pub fn mark_disconnected(&self, addr: &SocketAddr) {
        self.sets.write().connected.remove(addr);
    }

    /// A peer that behaved badly (protocol violation, checksum failure,
    /// handshake refusal) moves from good into bad and won't be dialed
    /// again until re-learned via `Addr`.
    pub fn mark_bad(&self, addr: SocketAddr) {
        let mut sets = self.sets.write();
        sets.good.remove(&addr);
        sets.bad.insert(addr);
    }

    /// Adds addresses learned from an `Addr` message. Bounded so a hostile
    /// peer can't grow the good set without limit; addresses already known
    /// bad are dropped rather than re-added.
    pub fn learn(&self, addresses: impl IntoIterator<Item = SocketAddr>, cap: usize) {
        let mut sets = self.sets.write();
        for addr in addresses {
            if sets.bad.contains(&addr) || sets.connected.contains(&addr) {
                continue;
            }
            if sets.good.len() >= cap {
                break;
            }
            sets.good.insert(addr);
        }
    }

    /// Picks up to `n` candidates from the good set, excluding anything
    /// already connected, in random order so repeated dial attempts don't
    /// always hit the same handful of peers first.
    pub fn dial_candidates(&self, n: usize) -> Vec<SocketAddr> {
        let sets = self.sets.read();
        let mut candidates: Vec<SocketAddr> = sets.good.difference(&sets.connected).copied().collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(n);
        candidates
    }

    /// Sample of everything this node currently believes is reachable
    /// (good and connected), for answering a peer's `GetAddr`.
    pub fn known_addresses(&self, n: usize) -> Vec<SocketAddr> {
        let sets = self.sets.read();
        let mut all: Vec<SocketAddr> = sets.good.union(&sets.connected).copied().collect();
        all.shuffle(&mut rand::thread_rng());
        all.truncate(n);
        all
    }

    pub fn needs_more_peers(&self, min_peers: usize) -> bool {
        self.connected_count() < min_peers
    }

    /// True once the good set (minus already-connected peers) can't supply
    /// enough new dial candidates — time to broadcast `GetAddr`.
    pub fn should_solicit_addresses(&self, min_peers: usize) -> bool {
        let sets = self.sets.read();
        sets.good.difference(&sets.connected).count() < min_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn seed_list_seeds_the_good_set() {
        let d = Discovery::new(&[addr(1), addr(2)]);
        assert_eq!(d.dial_candidates(10).len(), 2);
    }

    #[test]
    fn mark_connecting_refuses_duplicate_in_progress_connection() {
        let d = Discovery::new(&[]);
        assert!(d.mark_connecting(addr(1)));
        assert!(!d.mark_connecting(addr(1)));
    }

    #[test]
    fn bad_peers_are_excluded_from_future_learn_calls() {
        let d = Discovery::new(&[]);
        d.mark_bad(addr(1));
        d.learn([addr(1), addr(2)], 100);
        let candidates: HashSet<_> = d.dial_candidates(10).into_iter().collect();
        assert!(!candidates.contains(&addr(1)));
        assert!(candidates.contains(&addr(2)));
    }

    #[test]
    fn connected_peers_are_not_redialed() {
        let d = Discovery::new(&[addr(1), addr(2)]);
        d.mark_connecting(addr(1));
        assert_eq!(d.dial_candidates(10), vec![addr(2)]);
    }

    #[test]
    fn needs_more_peers_reflects_connected_count_against_min() {
        let d = Discovery::new(&[]);
        assert!(d.needs_more_peers(4));
        d.mark_connecting(addr(1));
        d.mark_connecting(addr(2));
        d.mark_connecting(addr(3));
        d.mark_connecting(addr(4));
        assert!(!d.needs_more_peers(4));
    }
}
