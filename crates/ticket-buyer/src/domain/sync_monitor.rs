use anyhow::Context;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time::sleep;

use crate::{
    config::TimingSettings,
    domain::{Error, Scope},
    infra::{Matcher, Wallet},
};

/// Random pause lengths, seedable so tests can pin them down.
pub struct JitterSource {
    rng: Mutex<ChaCha20Rng>,
}

impl JitterSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::from_rng(&mut rand::rng())),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Uniform duration in `[min, max]`, at millisecond resolution.
    pub fn between(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let millis = rng.random_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Watches that the matcher and the wallet keep following the same chain tip
/// while a match is pending.
///
/// A single mismatch is tolerated since blocks reach the two services at
/// slightly different times. The tips are compared again after a random
/// pause and only a second mismatch is an error.
pub struct SyncMonitor {
    matcher: Arc<dyn Matcher>,
    wallet: Arc<dyn Wallet>,
    check_interval: Duration,
    jitter_min: Duration,
    jitter_max: Duration,
    jitter: Arc<JitterSource>,
}

impl SyncMonitor {
    pub fn new(
        matcher: Arc<dyn Matcher>,
        wallet: Arc<dyn Wallet>,
        timing: &TimingSettings,
        jitter: Arc<JitterSource>,
    ) -> Self {
        let (jitter_min, jitter_max) = timing.sync_jitter_bounds();
        Self {
            matcher,
            wallet,
            check_interval: timing.sync_check_interval(),
            jitter_min,
            jitter_max,
            jitter,
        }
    }

    /// Runs until the scope ends (`Ok`) or the tips disagree twice in a row.
    pub async fn watch(&self, scope: &Scope) -> Result<(), anyhow::Error> {
        info!("Starting matcher/wallet sync monitor");

        loop {
            tokio::select! {
                _ = sleep(self.check_interval) => {}
                _ = scope.done() => {
                    debug!("Sync monitor cancelled during sleep");
                    return Ok(());
                }
            }

            let first = match self.check_sync(scope).await {
                Ok(()) => continue,
                Err(e) => e,
            };
            if scope.is_done() {
                return Ok(());
            }

            let pause = self.jitter.between(self.jitter_min, self.jitter_max);
            warn!(
                "Matcher and wallet possibly out of sync ({:#}), checking again in {:?}",
                first, pause
            );
            tokio::select! {
                _ = sleep(pause) => {}
                _ = scope.done() => {
                    debug!("Sync monitor cancelled before recheck");
                    return Ok(());
                }
            }

            match self.check_sync(scope).await {
                Ok(()) => info!("Matcher and wallet back in sync"),
                Err(_) if scope.is_done() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_sync(&self, scope: &Scope) -> Result<(), anyhow::Error> {
        let status = self
            .matcher
            .status(scope)
            .await
            .context("error checking status of matcher")?;
        let chain = self
            .wallet
            .current_chain_info(scope)
            .await
            .context("error checking chain info of wallet")?;

        if status.mainchain_hash != chain.best_block_hash {
            return Err(Error::OutOfSync {
                matcher: status.mainchain_hash,
                wallet: chain.best_block_hash,
            }
            .into());
        }
        Ok(())
    }
}
