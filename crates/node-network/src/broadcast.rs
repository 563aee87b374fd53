//! Broadcast fan-out: rather than relaying to every connected peer, a
//! message is sent to a logarithmically-sized random subset,
//! `1 + ceil(log_factor(peer_count))`, so gossip volume grows slowly as
//! the network does. Selection itself is pure (no I/O); `server` owns the
//! actual per-peer sends.

use rand::seq::SliceRandom;

/// Number of peers to fan a broadcast out to, given how many are connected
/// and the configured broadcast factor. A factor `<= 1.0` degenerates to
/// "one peer" rather than dividing by zero or growing unbounded.
pub fn fanout_count(peer_count: usize, factor: f64) -> usize {
    if peer_count == 0 {
        return 0;
    }
    if factor <= 1.0 {
        return 1.min(peer_count);
    }
    let extra = (peer_count as f64).log(factor).ceil().max(0.0) as usize;
    (1 + extra).min(peer_count)
}

/// Chooses `fanout_count(peers.len(), factor)` peers at random, without
/// replacement.
pub fn choose_fanout_peers<T: Clone>(peers: &[T], factor: f64) -> Vec<T> {
    let n = fanout_count(peers.len(), factor);
    let mut pool: Vec<T> = peers.to_vec();
    pool.shuffle(&mut rand::thread_rng());
    pool.truncate(n);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_peer_always_gets_the_broadcast() {
        assert_eq!(fanout_count(1, 2.0), 1);
    }

    #[test]
    fn zero_peers_means_zero_fanout() {
        assert_eq!(fanout_count(0, 2.0), 0);
    }

    #[test]
    fn fanout_grows_logarithmically_not_linearly() {
        let small = fanout_count(8, 2.0);
        let large = fanout_count(1024, 2.0);
        assert!(large > small);
        assert!(large < 1024 / 4);
    }

    #[test]
    fn fanout_never_exceeds_peer_count() {
        assert!(fanout_count(3, 1.2) <= 3);
    }

    #[test]
    fn chosen_peers_are_a_subset_of_the_input() {
        let peers = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let chosen = choose_fanout_peers(&peers, 2.0);
        assert!(chosen.len() <= peers.len());
        for p in &chosen {
            assert!(peers.contains(p));
        }
    }
}
