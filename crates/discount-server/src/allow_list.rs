use discount_sdk::crypto::{decode_hash, to_hex_prefixed, Hash};
use discount_sdk::merkle::MerkleProofSet;
use discount_sdk::{Address, Chain, DiscountKind, Mechanism};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{Result, ServerError};

/// On-disk shape of one precomputed allow-list
#[derive(Deserialize)]
struct AllowListFile {
    slug: String,
    chain: String,
    namespace: String,
    validator: Address,
    root: String,
    entries: HashMap<String, Vec<String>>,
}

pub struct AllowList {
    pub kind: DiscountKind,
    pub chain: Chain,
    pub namespace: String,
    pub validator: Address,
    pub root: Hash,
    entries: HashMap<Address, MerkleProofSet>,
}

impl AllowList {
    /// Parses a list file, keeping only entries whose proof verifies against the root
    pub fn parse(contents: &str) -> Result<Self> {
        let file: AllowListFile = serde_json::from_str(contents)
            .map_err(|e| ServerError::Config(format!("Malformed allow-list: {}", e)))?;

        let kind: DiscountKind = file.slug.parse()?;
        if kind.mechanism() != Mechanism::AllowList {
            return Err(ServerError::Config(format!(
                "{} is not an allow-list mechanism",
                kind
            )));
        }
        let chain: Chain = file.chain.parse()?;
        let root = decode_hash(&file.root)?;

        let mut entries = HashMap::with_capacity(file.entries.len());
        let mut dropped = 0usize;
        for (raw_address, raw_proofs) in file.entries {
            match Self::verified_entry(&raw_address, &raw_proofs, &root) {
                Some((address, proofs)) => {
                    entries.insert(address, proofs);
                }
                None => {
                    warn!("{} on {}: dropping entry {}", kind, chain, raw_address);
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            warn!(
                "{} on {}: {} entries failed verification against root {}",
                kind,
                chain,
                dropped,
                to_hex_prefixed(&root)
            );
        }

        Ok(Self {
            kind,
            chain,
            namespace: file.namespace,
            validator: file.validator,
            root,
            entries,
        })
    }

    fn verified_entry(
        raw_address: &str,
        raw_proofs: &[String],
        root: &Hash,
    ) -> Option<(Address, MerkleProofSet)> {
        let address: Address = raw_address.parse().ok()?;
        let proofs = raw_proofs
            .iter()
            .map(|p| decode_hash(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .ok()?;
        // Clients read an empty proof list as non-membership
        if proofs.is_empty() {
            return None;
        }
        let set = MerkleProofSet::new(proofs);
        set.verifies(&address, root).then_some((address, set))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn proofs_for(&self, address: &Address) -> Option<&MerkleProofSet> {
        self.entries.get(address)
    }
}

/// Proofs for one address, ready to serve
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowListProof {
    pub namespace: String,
    pub validator: Address,
    pub proofs: MerkleProofSet,
}

#[derive(Clone, Debug, Serialize)]
pub struct AllowListSummary {
    pub slug: &'static str,
    pub chain: Chain,
    pub namespace: String,
    pub validator: Address,
    pub size: usize,
}

/// Allow-lists for every (mechanism, chain) pair the server knows about
#[derive(Default)]
pub struct AllowListService {
    lists: Arc<RwLock<HashMap<(DiscountKind, Chain), AllowList>>>,
}

impl AllowListService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` in `dir`. Files that fail to parse are skipped.
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let service = Self::new();
        if !dir.exists() {
            warn!(
                "Allow-list directory {} does not exist, no allow-lists loaded",
                dir.display()
            );
            return Ok(service);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| ServerError::Config(format!("Failed to read {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in paths {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    error!("Failed to read allow-list {}: {}", path.display(), e);
                    continue;
                }
            };
            match AllowList::parse(&contents) {
                Ok(list) => service.insert(list).await,
                Err(e) => error!("Skipping allow-list {}: {}", path.display(), e),
            }
        }

        Ok(service)
    }

    pub async fn insert(&self, list: AllowList) {
        if list.is_empty() {
            warn!("{} allow-list for {} has no servable entries", list.kind, list.chain);
        }
        info!(
            "Loaded {} allow-list for {} ({} addresses, root {})",
            list.kind,
            list.chain,
            list.len(),
            to_hex_prefixed(&list.root)
        );
        let mut lists = self.lists.write().await;
        if lists.insert((list.kind, list.chain), list).is_some() {
            warn!("Replaced an earlier allow-list for the same mechanism and chain");
        }
    }

    pub async fn lookup(
        &self,
        kind: DiscountKind,
        chain: Chain,
        address: &Address,
    ) -> Option<AllowListProof> {
        let lists = self.lists.read().await;
        let list = lists.get(&(kind, chain))?;
        list.proofs_for(address).map(|proofs| AllowListProof {
            namespace: list.namespace.clone(),
            validator: list.validator,
            proofs: proofs.clone(),
        })
    }

    pub async fn summaries(&self) -> Vec<AllowListSummary> {
        let lists = self.lists.read().await;
        let mut summaries: Vec<_> = lists
            .values()
            .map(|list| AllowListSummary {
                slug: list.kind.slug(),
                chain: list.chain,
                namespace: list.namespace.clone(),
                validator: list.validator,
                size: list.len(),
            })
            .collect();
        summaries.sort_by_key(|s| (s.slug, s.chain));
        summaries
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use discount_sdk::crypto::hash_pair;
    use discount_sdk::merkle::leaf_for;
    use serde_json::json;

    pub(crate) fn addr(last: u8) -> Address {
        format!("0x{:040x}", last).parse().unwrap()
    }

    /// Two-leaf tree over `a` and `b`: each leaf's proof is the other leaf
    pub(crate) fn two_member_list(slug: &str, a: Address, b: Address) -> String {
        let (la, lb) = (leaf_for(&a), leaf_for(&b));
        let root = hash_pair(&la, &lb);
        let mut entries = serde_json::Map::new();
        entries.insert(a.to_string(), json!([to_hex_prefixed(&lb)]));
        entries.insert(b.to_string(), json!([to_hex_prefixed(&la)]));
        json!({
            "slug": slug,
            "chain": "base-mainnet",
            "namespace": format!("{}_discount", slug),
            "validator": addr(0xbb).to_string(),
            "root": to_hex_prefixed(&root),
            "entries": entries,
        })
        .to_string()
    }

    #[test]
    fn test_parse_keeps_verified_entries() {
        let list = AllowList::parse(&two_member_list("cbid", addr(1), addr(2))).unwrap();
        assert_eq!(list.kind, DiscountKind::Cbid);
        assert_eq!(list.chain, Chain::BaseMainnet);
        assert_eq!(list.len(), 2);
        assert!(list.proofs_for(&addr(1)).is_some());
        assert!(list.proofs_for(&addr(3)).is_none());
    }

    #[test]
    fn test_parse_drops_entries_that_do_not_verify() {
        let mut file: serde_json::Value =
            serde_json::from_str(&two_member_list("bns", addr(1), addr(2))).unwrap();
        file["entries"][addr(3).to_string()] = json!([to_hex_prefixed(&[9u8; 32])]);
        file["entries"]["not-an-address"] = json!([]);

        let list = AllowList::parse(&file.to_string()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.proofs_for(&addr(3)).is_none());
    }

    #[test]
    fn test_parse_drops_entries_without_proofs() {
        // Single-leaf tree: the root is the leaf itself and the proof is empty
        let root = leaf_for(&addr(1));
        let mut entries = serde_json::Map::new();
        entries.insert(addr(1).to_string(), json!([]));
        let contents = json!({
            "slug": "cbid",
            "chain": "base-mainnet",
            "namespace": "cbid_discount",
            "validator": addr(0xbb).to_string(),
            "root": to_hex_prefixed(&root),
            "entries": entries,
        })
        .to_string();

        let list = AllowList::parse(&contents).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.root, root);
        assert!(list.proofs_for(&addr(1)).is_none());
    }

    #[test]
    fn test_parse_rejects_non_allow_list_mechanism() {
        let contents = two_member_list("coinbase-verified-account", addr(1), addr(2));
        assert!(AllowList::parse(&contents).is_err());
        assert!(AllowList::parse("{ not json").is_err());
    }

    #[tokio::test]
    async fn test_load_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cbid.json"),
            two_member_list("cbid", addr(1), addr(2)),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let service = AllowListService::load_dir(dir.path()).await.unwrap();
        let proof = service
            .lookup(DiscountKind::Cbid, Chain::BaseMainnet, &addr(1))
            .await
            .unwrap();
        assert_eq!(proof.namespace, "cbid_discount");
        assert_eq!(proof.validator, addr(0xbb));
        assert_eq!(proof.proofs.proofs, vec![leaf_for(&addr(2))]);

        assert!(service
            .lookup(DiscountKind::Cbid, Chain::BaseSepolia, &addr(1))
            .await
            .is_none());
        assert_eq!(service.summaries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_dir_is_empty() {
        let service = AllowListService::load_dir(Path::new("/nonexistent/allow_lists"))
            .await
            .unwrap();
        assert!(service.summaries().await.is_empty());
    }
}
