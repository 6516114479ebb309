//! Runs every registered runner for an address and picks one discount.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::address::Address;
use crate::runner::EligibilityRunner;
use crate::types::{DiscountKind, EligibilityResult, EligibilityStatus, SelectedDiscount};

#[derive(Default)]
pub struct DiscountAggregator {
    runners: Vec<Arc<EligibilityRunner>>,
}

impl DiscountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a runner, replacing any earlier one for the same kind
    pub fn register(&mut self, runner: EligibilityRunner) {
        self.runners.retain(|r| r.kind() != runner.kind());
        self.runners.push(Arc::new(runner));
        self.runners.sort_by_key(|r| r.kind().priority());
    }

    pub fn with_runner(mut self, runner: EligibilityRunner) -> Self {
        self.register(runner);
        self
    }

    pub fn kinds(&self) -> Vec<DiscountKind> {
        self.runners.iter().map(|r| r.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Settled result of every runner, in priority order.
    ///
    /// Runners execute concurrently and independently. Dropping the returned
    /// future aborts whatever is still in flight.
    pub async fn report(&self, address: Address) -> Vec<EligibilityResult> {
        let mut tasks = JoinSet::new();
        for (slot, runner) in self.runners.iter().enumerate() {
            let runner = Arc::clone(runner);
            tasks.spawn(async move { (slot, runner.check(address).await) });
        }

        let mut results: Vec<EligibilityResult> = self
            .runners
            .iter()
            .map(|r| EligibilityResult::pending(r.kind(), address))
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, result)) => results[slot] = result,
                Err(e) => {
                    // A panicking runner must not leave its slot pending forever
                    error!("eligibility runner task failed: {}", e);
                }
            }
        }

        for result in results.iter_mut().filter(|r| !r.is_settled()) {
            result.status = EligibilityStatus::Errored("runner task failed".into());
        }
        results
    }

    pub async fn resolve(&self, address: Address) -> SelectedDiscount {
        let results = self.report(address).await;
        let selected = select(address, &results);
        match selected.kind() {
            Some(kind) => info!("selected {} discount for {}", kind, address),
            None => info!("no discount applies to {}", address),
        }
        selected
    }
}

/// Pure selection step: first eligible result in priority order.
///
/// Results tagged with any other address are ignored, so a late answer for a
/// superseded address can never be chosen. Input order does not matter.
pub fn select(address: Address, results: &[EligibilityResult]) -> SelectedDiscount {
    for kind in DiscountKind::PRIORITY {
        let claim = results
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| {
                let current = r.address == address;
                if !current {
                    debug!("ignoring stale {} result for {}", r.kind, r.address);
                }
                current
            })
            .find_map(|r| r.claim().filter(|c| c.address == address));

        if let Some(claim) = claim {
            return SelectedDiscount {
                address,
                claim: Some(claim.clone()),
            };
        }
    }
    SelectedDiscount::none(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Chain;
    use crate::merkle::MerkleProofSet;
    use crate::source::OnChainOnly;
    use crate::testing::{addr, FixedSource, FixedValidator, SlowSource};
    use crate::types::{DiscountClaim, IneligibleReason, ProofArtifact};
    use std::time::Duration;

    fn eligible(kind: DiscountKind, address: Address) -> EligibilityResult {
        EligibilityResult {
            kind,
            address,
            status: EligibilityStatus::Eligible(DiscountClaim {
                kind,
                validator: addr(0xbb),
                payload: vec![0],
                address,
            }),
        }
    }

    fn ineligible(kind: DiscountKind, address: Address) -> EligibilityResult {
        EligibilityResult {
            kind,
            address,
            status: EligibilityStatus::Ineligible(IneligibleReason::NoArtifact),
        }
    }

    fn merkle_source() -> Arc<FixedSource> {
        FixedSource::found(ProofArtifact::MerkleProofSet(MerkleProofSet::new(vec![[7u8; 32]])))
    }

    #[test]
    fn test_select_none_eligible() {
        let a = addr(1);
        let results: Vec<_> = DiscountKind::PRIORITY
            .iter()
            .map(|k| ineligible(*k, a))
            .collect();
        assert_eq!(select(a, &results), SelectedDiscount::none(a));
    }

    #[test]
    fn test_select_is_order_independent() {
        let a = addr(1);
        let mut results = vec![
            eligible(DiscountKind::CoinbaseVerifiedAccount, a),
            ineligible(DiscountKind::DiscountCode, a),
            eligible(DiscountKind::Cbid, a),
            eligible(DiscountKind::BnsName, a),
        ];
        let first = select(a, &results);
        assert_eq!(first.kind(), Some(DiscountKind::Cbid));

        results.reverse();
        assert_eq!(select(a, &results), first);
        results.rotate_left(1);
        assert_eq!(select(a, &results), first);
    }

    #[test]
    fn test_select_ignores_stale_address() {
        let current = addr(1);
        let stale = addr(2);
        let results = vec![
            eligible(DiscountKind::DiscountCode, stale),
            eligible(DiscountKind::BnsName, current),
        ];
        assert_eq!(
            select(current, &results).kind(),
            Some(DiscountKind::BnsName)
        );
        assert_eq!(select(addr(3), &results), SelectedDiscount::none(addr(3)));
    }

    #[test]
    fn test_errored_and_pending_are_never_selected() {
        let a = addr(1);
        let results = vec![
            EligibilityResult::pending(DiscountKind::DiscountCode, a),
            EligibilityResult {
                kind: DiscountKind::Cbid,
                address: a,
                status: EligibilityStatus::Errored("rpc down".into()),
            },
        ];
        assert!(select(a, &results).claim.is_none());
    }

    #[test]
    fn test_register_keeps_priority_order_and_replaces() {
        let validator = FixedValidator::answer(false);
        let aggregator = DiscountAggregator::new()
            .with_runner(EligibilityRunner::new(
                DiscountKind::CoinbaseVerifiedAccount,
                Chain::BaseMainnet,
                addr(0xb1),
                Arc::new(OnChainOnly),
                validator.clone(),
            ))
            .with_runner(EligibilityRunner::new(
                DiscountKind::Cbid,
                Chain::BaseMainnet,
                addr(0xb2),
                FixedSource::not_found(),
                validator.clone(),
            ))
            .with_runner(EligibilityRunner::new(
                DiscountKind::CoinbaseVerifiedAccount,
                Chain::BaseMainnet,
                addr(0xb3),
                Arc::new(OnChainOnly),
                validator,
            ));

        assert_eq!(
            aggregator.kinds(),
            vec![DiscountKind::Cbid, DiscountKind::CoinbaseVerifiedAccount]
        );
    }

    #[tokio::test]
    async fn test_resolve_exactly_one_eligible() {
        let a = addr(0xaa);
        let aggregator = DiscountAggregator::new()
            .with_runner(EligibilityRunner::new(
                DiscountKind::Cbid,
                Chain::BaseMainnet,
                addr(0xb1),
                FixedSource::not_found(),
                FixedValidator::answer(true),
            ))
            .with_runner(EligibilityRunner::new(
                DiscountKind::BaseDotEthNft,
                Chain::BaseMainnet,
                addr(0xb2),
                Arc::new(OnChainOnly),
                FixedValidator::answer(true),
            ))
            .with_runner(EligibilityRunner::new(
                DiscountKind::CoinbaseVerifiedAccount,
                Chain::BaseMainnet,
                addr(0xb3),
                Arc::new(OnChainOnly),
                FixedValidator::answer(false),
            ));

        let selected = aggregator.resolve(a).await;
        let claim = selected.claim.unwrap();
        assert_eq!(claim.kind, DiscountKind::BaseDotEthNft);
        assert_eq!(claim.validator, addr(0xb2));
        assert_eq!(claim.address, a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_beats_completion_order() {
        // The higher-priority runner finishes last
        let a = addr(0xaa);
        let aggregator = DiscountAggregator::new()
            .with_runner(EligibilityRunner::new(
                DiscountKind::SummerPassLvl3,
                Chain::BaseMainnet,
                addr(0xb1),
                Arc::new(OnChainOnly),
                FixedValidator::delayed_answer(true, Duration::from_secs(5)),
            ))
            .with_runner(EligibilityRunner::new(
                DiscountKind::BnsName,
                Chain::BaseMainnet,
                addr(0xb2),
                merkle_source(),
                FixedValidator::answer(true),
            ));

        for _ in 0..3 {
            assert_eq!(
                aggregator.resolve(a).await.kind(),
                Some(DiscountKind::SummerPassLvl3)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_waits_for_slow_runners() {
        let a = addr(0xaa);
        let slow = SlowSource::new(Duration::from_secs(3), merkle_source());
        let aggregator = DiscountAggregator::new().with_runner(EligibilityRunner::new(
            DiscountKind::Cbid,
            Chain::BaseMainnet,
            addr(0xb1),
            slow,
            FixedValidator::answer(true),
        ));

        let report = aggregator.report(a).await;
        assert_eq!(report.len(), 1);
        assert!(report.iter().all(|r| r.is_settled()));
        assert!(report[0].claim().is_some());
    }

    #[tokio::test]
    async fn test_only_listed_claimers_are_eligible() {
        let validator = FixedValidator::eligible(vec![addr(1)]);
        let aggregator = DiscountAggregator::new().with_runner(EligibilityRunner::new(
            DiscountKind::CoinbaseVerifiedAccount,
            Chain::BaseSepolia,
            addr(0xb1),
            Arc::new(OnChainOnly),
            validator,
        ));

        assert!(aggregator.resolve(addr(1)).await.claim.is_some());
        assert!(aggregator.resolve(addr(2)).await.claim.is_none());
    }

    #[tokio::test]
    async fn test_empty_registry_selects_nothing() {
        let aggregator = DiscountAggregator::new();
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.resolve(addr(1)).await, SelectedDiscount::none(addr(1)));
    }
}
