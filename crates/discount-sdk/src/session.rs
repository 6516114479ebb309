//! Tracks the connected wallet address and re-resolves on change.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::address::Address;
use crate::aggregator::DiscountAggregator;
use crate::types::SelectedDiscount;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Selected(SelectedDiscount),
    /// No wallet connected
    NoAddress,
    /// Address changed before resolution finished; the partial work was discarded
    Superseded,
}

pub struct DiscountSession {
    aggregator: Arc<DiscountAggregator>,
    address: watch::Sender<Option<Address>>,
}

impl DiscountSession {
    pub fn new(aggregator: Arc<DiscountAggregator>) -> Self {
        let (address, _) = watch::channel(None);
        Self { aggregator, address }
    }

    pub fn address(&self) -> Option<Address> {
        *self.address.borrow()
    }

    /// Switches the session to a new address (or disconnects with `None`).
    /// Any resolution in flight for the previous address is abandoned;
    /// re-announcing the current address leaves it running.
    pub fn set_address(&self, address: Option<Address>) {
        let mut previous = None;
        let changed = self.address.send_if_modified(|current| {
            if *current == address {
                return false;
            }
            previous = std::mem::replace(current, address);
            true
        });
        if changed {
            info!(
                "session address changed: {} -> {}",
                previous.map(|a| a.to_string()).unwrap_or_else(|| "none".into()),
                address.map(|a| a.to_string()).unwrap_or_else(|| "none".into())
            );
        }
    }

    pub async fn resolve(&self) -> Resolution {
        let mut changes = self.address.subscribe();
        let address = match *changes.borrow_and_update() {
            Some(address) => address,
            None => return Resolution::NoAddress,
        };

        tokio::select! {
            selected = self.aggregator.resolve(address) => {
                if self.address() == Some(address) {
                    Resolution::Selected(selected)
                } else {
                    Resolution::Superseded
                }
            }
            _ = changes.changed() => {
                info!("resolution for {} superseded", address);
                Resolution::Superseded
            }
        }
    }
}
