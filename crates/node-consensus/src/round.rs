//! Per-height, per-view vote bookkeeping. One `Round` lives for exactly
//! one height; `view` advances in place as change-views land, discarding
//! whatever the previous view had collected (a new primary means a new
//! proposal, so old pre-commits/commits no longer apply).

use std::collections::HashMap;

use node_types::UInt256;

use crate::messages::BlockProposal;

pub struct Round {
    pub height: u32,
    pub view: u8,
    pub validator_count: usize,
    pub proposal: Option<BlockProposal>,
    pub pre_commits: HashMap<u8, (UInt256, [u8; 64])>,
    pub commits: HashMap<u8, (UInt256, [u8; 64])>,
    pub change_views: HashMap<u8, u8>,
    pub sent_pre_commit: bool,
    pub sent_commit: bool,
    pub finalized: bool,
}

impl Round {
    pub fn new(height: u32, validator_count: usize) -> Self {
        Self {
            height,
            view: 0,
            validator_count,
            proposal: None,
            pre_commits: HashMap::new(),
            commits: HashMap::new(),
            change_views: HashMap::new(),
            sent_pre_commit: false,
            sent_commit: false,
            finalized: false,
        }
    }

    pub fn enter_view(&mut self, view: u8) {
        self.view = view;
        self.proposal = None;
        self.pre_commits.clear();
        self.commits.clear();
        self.sent_pre_commit = false;
        self.sent_commit = false;
        // change_views deliberately survives: a validator requesting view 3
        // while this node is still on view 1 should still count once this
        // node also reaches view 2 and asks for 3.
    }

    pub fn quorum(&self) -> usize {
        crate::validators::quorum(self.validator_count)
    }

    pub fn pre_commits_for(&self, hash: &UInt256) -> Vec<(u8, [u8; 64])> {
        self.pre_commits
            .iter()
            .filter(|(_, (h, _))| h == hash)
            .map(|(idx, (_, sig))| (*idx, *sig))
            .collect()
    }

    pub fn commits_for(&self, hash: &UInt256) -> Vec<(u8, [u8; 64])> {
        self.commits
            .iter()
            .filter(|(_, (h, _))| h == hash)
            .map(|(idx, (_, sig))| (*idx, *sig))
            .collect()
    }

    pub fn change_view_votes_for(&self, target: u8) -> usize {
        self.change_views.values().filter(|&&v| v == target).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_a_new_view_drops_the_old_proposal_and_votes() {
        let mut round = Round::new(10, 4);
        round.proposal = Some(BlockProposal { header: test_header(), tx_hashes: vec![] });
        round.pre_commits.insert(0, (UInt256::ZERO, [0u8; 64]));
        round.sent_pre_commit = true;
        round.change_views.insert(0, 1);

        round.enter_view(1);

        assert!(round.proposal.is_none());
        assert!(round.pre_commits.is_empty());
        assert!(!round.sent_pre_commit);
        assert_eq!(round.change_views.get(&0), Some(&1));
    }

    #[test]
    fn quorum_counts_only_matching_votes() {
        let mut round = Round::new(10, 4);
        let a = UInt256::ZERO;
        round.pre_commits.insert(0, (a, [1u8; 64]));
        round.pre_commits.insert(1, (a, [2u8; 64]));
        round.pre_commits.insert(2, (UInt256([1u8; 32]), [3u8; 64]));
        assert_eq!(round.pre_commits_for(&a).len(), 2);
    }

    fn test_header() -> node_types::BlockHeader {
        node_types::BlockHeader {
            version: 0,
            prev_hash: UInt256::ZERO,
            merkle_root: UInt256::ZERO,
            timestamp: 0,
            nonce: 0,
            index: 10,
            primary_index: 0,
            next_consensus: node_types::UInt160::ZERO,
            witness: node_types::Witness::default(),
            state_root: None,
        }
    }
}
