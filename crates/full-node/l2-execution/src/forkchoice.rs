use std::fmt;

use l2_metrics::update_metrics;
use l2_rollup_interface::services::{ChainError, ChainStore};
use l2_rollup_interface::{ForkchoiceState, Header, PayloadStatus, H256};
use tracing::{debug, info, warn};

use crate::ExecutionBackend;

/// The auxiliary fork-choice pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The safe block.
    Safe,
    /// The finalized block.
    Finalized,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Finalized => f.write_str("finalized"),
        }
    }
}

/// Errors returned by [`ExecutionBackend::forkchoice_update`].
///
/// Every error corresponds to an `INVALID` payload status, see [`ForkchoiceError::payload_status`].
#[derive(Debug, thiserror::Error)]
pub enum ForkchoiceError {
    /// The safe or finalized hash is unknown or not on the canonical chain.
    #[error("invalid forkchoice state: {marker} block {hash:?} is not on the canonical chain")]
    InvalidForkchoiceState {
        /// Which pointer was rejected.
        marker: Marker,
        /// The rejected hash.
        hash: H256,
    },
    /// Switching to the requested head failed.
    #[error("failed to set canonical head, last valid block {latest_valid_hash:?}: {source}")]
    Reorg {
        /// Best-effort hash of the last valid block.
        latest_valid_hash: H256,
        /// Chain failure.
        source: ChainError,
    },
}

impl ForkchoiceError {
    /// The `INVALID` status reported alongside this error.
    pub fn payload_status(&self) -> PayloadStatus {
        match self {
            Self::InvalidForkchoiceState { .. } => PayloadStatus::invalid(None),
            Self::Reorg {
                latest_valid_hash, ..
            } => PayloadStatus::invalid(Some(*latest_valid_hash)),
        }
    }
}

impl<C: ChainStore, P> ExecutionBackend<C, P> {
    /// Moves the canonical head and the safe/finalized markers as requested.
    ///
    /// An unknown or zero head is answered with `INVALID` and no error. A head
    /// that is already canonical but behind the current head is ignored and the
    /// current head is reported `VALID`.
    pub fn forkchoice_update(
        &mut self,
        update: &ForkchoiceState,
    ) -> Result<PayloadStatus, ForkchoiceError> {
        update_metrics(|metrics| metrics.forkchoice_updates.inc());

        if update.head_hash.is_zero() {
            warn!("Forkchoice requested update to zero hash");
            return Ok(PayloadStatus::invalid(None));
        }
        let Some(block) = self.chain.block_by_hash(update.head_hash) else {
            warn!(head = ?update.head_hash, "Forkchoice requested unknown head");
            return Ok(PayloadStatus::invalid(None));
        };

        if self.chain.canonical_hash(block.number()) != Some(update.head_hash) {
            if let Err(source) = self.chain.set_canonical(&block) {
                let latest_valid_hash = source
                    .latest_valid_hash()
                    .unwrap_or_else(|| self.chain.current_header().hash());
                warn!(head = %block.id(), %source, "Failed to set canonical head");
                return Err(ForkchoiceError::Reorg {
                    latest_valid_hash,
                    source,
                });
            }
            info!(head = %block.id(), "Switched canonical head");
            update_metrics(|metrics| {
                metrics
                    .head_number
                    .set(i64::try_from(block.number()).unwrap_or(i64::MAX));
            });
        } else {
            let current = self.chain.current_header();
            if current.hash() != update.head_hash {
                info!(
                    number = block.number(),
                    hash = ?update.head_hash,
                    have = current.number,
                    "Ignoring forkchoice update to old head"
                );
                return Ok(PayloadStatus::valid(current.hash()));
            }
            debug!(head = %block.id(), "Forkchoice head unchanged");
        }

        if !update.finalized_hash.is_zero() {
            let finalized = self.canonical_marker(Marker::Finalized, update.finalized_hash)?;
            self.chain.set_finalized(&finalized);
        }
        if !update.safe_hash.is_zero() {
            let safe = self.canonical_marker(Marker::Safe, update.safe_hash)?;
            self.chain.set_safe(&safe);
        }

        Ok(PayloadStatus::valid(self.chain.current_header().hash()))
    }

    fn canonical_marker(&self, marker: Marker, hash: H256) -> Result<Header, ForkchoiceError> {
        let header = self.chain.header_by_hash(hash).filter(|header| {
            self.chain.canonical_hash(header.number) == Some(hash)
        });
        header.ok_or_else(|| {
            warn!(%marker, ?hash, "Forkchoice marker is not canonical");
            ForkchoiceError::InvalidForkchoiceState { marker, hash }
        })
    }
}
