/// Allow-list inclusion proofs: leaves are keccak256(address), internal nodes
/// hash sorted pairs, so a proof is just the list of sibling hashes.
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto::{hash_pair, keccak256, Hash};

pub fn leaf_for(address: &Address) -> Hash {
    keccak256(address.as_bytes())
}

pub fn compute_root(leaf: Hash, proof: &[Hash]) -> Hash {
    proof.iter().fold(leaf, |node, sibling| hash_pair(&node, sibling))
}

pub fn verify(proof: &[Hash], root: &Hash, leaf: &Hash) -> bool {
    compute_root(*leaf, proof) == *root
}

/// Proof set for one address in one allow-list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProofSet {
    pub proofs: Vec<Hash>,
}

impl MerkleProofSet {
    pub fn new(proofs: Vec<Hash>) -> Self {
        Self { proofs }
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn verifies(&self, address: &Address, root: &Hash) -> bool {
        verify(&self.proofs, root, &leaf_for(address))
    }
}
