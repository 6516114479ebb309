//! In-process stand-ins for the proof service and validator contracts.

use async_trait::async_trait;
use namegate_net::NetError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::address::Address;
use crate::error::{Result, SdkError};
use crate::source::{ArtifactRequest, FetchOutcome, ProofSource};
use crate::types::ProofArtifact;
use crate::validator::ValidatorCaller;

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address(bytes)
}

enum Behaviour {
    Outcome(FetchOutcome),
    Fault,
    Unreachable,
}

pub struct FixedSource {
    behaviour: Behaviour,
}

impl FixedSource {
    pub fn found(artifact: ProofArtifact) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Outcome(FetchOutcome::Found(artifact)),
        })
    }

    pub fn not_found() -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Outcome(FetchOutcome::NotFound),
        })
    }

    pub fn already_claimed() -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Outcome(FetchOutcome::AlreadyClaimed),
        })
    }

    pub fn fault() -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Fault,
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Unreachable,
        })
    }
}

#[async_trait]
impl ProofSource for FixedSource {
    async fn fetch(&self, _request: &ArtifactRequest) -> Result<FetchOutcome> {
        match &self.behaviour {
            Behaviour::Outcome(outcome) => Ok(outcome.clone()),
            Behaviour::Fault => Err(SdkError::ProofService("malformed response".into())),
            Behaviour::Unreachable => Err(SdkError::Network(NetError::Connection(
                "connection refused".into(),
            ))),
        }
    }
}

pub struct SlowSource {
    delay: Duration,
    inner: Arc<dyn ProofSource>,
}

impl SlowSource {
    pub fn new(delay: Duration, inner: Arc<dyn ProofSource>) -> Arc<Self> {
        Arc::new(Self { delay, inner })
    }
}

#[async_trait]
impl ProofSource for SlowSource {
    async fn fetch(&self, request: &ArtifactRequest) -> Result<FetchOutcome> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch(request).await
    }
}

/// Validator with a canned answer; `None` simulates a failing RPC node
pub struct FixedValidator {
    answer: Option<bool>,
    only_for: Option<Vec<Address>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_payload: Mutex<Option<Vec<u8>>>,
}

impl FixedValidator {
    fn build(
        answer: Option<bool>,
        only_for: Option<Vec<Address>>,
        delay: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            answer,
            only_for,
            delay,
            calls: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
        })
    }

    pub fn answer(valid: bool) -> Arc<Self> {
        Self::build(Some(valid), None, None)
    }

    pub fn delayed_answer(valid: bool, delay: Duration) -> Arc<Self> {
        Self::build(Some(valid), None, Some(delay))
    }

    /// True only for the listed claimers
    pub fn eligible(claimers: Vec<Address>) -> Arc<Self> {
        Self::build(Some(true), Some(claimers), None)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None, None, None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<Vec<u8>> {
        self.last_payload.lock().unwrap().clone()
    }
}

#[async_trait]
impl ValidatorCaller for FixedValidator {
    async fn is_valid_discount_registration(
        &self,
        _validator: &Address,
        claimer: &Address,
        payload: &[u8],
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self
            .answer
            .ok_or_else(|| SdkError::Network(NetError::Connection("node unreachable".into())))?;
        Ok(match &self.only_for {
            Some(list) => answer && list.contains(claimer),
            None => answer,
        })
    }
}
