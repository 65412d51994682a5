use crate::{cli::globals::GlobalArgs, vault};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::future::Future;
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{debug, error, instrument, warn};

const MAX_ATTEMPTS: u32 = 3;

/// Leases shorter than this are renewed as if they lasted this long.
const MIN_LEASE_SECS: u64 = 10;

/// Renew `what` forever, sleeping 70-90% of each granted lease. After
/// [`MAX_ATTEMPTS`] consecutive failures the task signals `tx` and stops.
async fn renew_loop<F, Fut>(what: &'static str, tx: mpsc::UnboundedSender<()>, mut renew: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let mut rng = StdRng::from_entropy();

    loop {
        let mut next = Duration::default();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let backoff_time = 2u64.pow(attempt - 1);
                warn!("Backing off for {} seconds", backoff_time);
                sleep(Duration::from_secs(backoff_time)).await;
            }

            match renew().await {
                Ok(lease_duration) => {
                    let factor = rng.gen_range(70..90);
                    next = Duration::from_secs(lease_duration.max(MIN_LEASE_SECS) * factor / 100);
                    break;
                }
                Err(e) => {
                    error!("Failed to renew {what}: {e}");

                    if attempt == MAX_ATTEMPTS {
                        error!("Failed to renew {what} after {MAX_ATTEMPTS} attempts");
                        let _ = tx.send(());
                        return;
                    }
                }
            }
        }

        debug!("Will renew {what} in {} seconds", next.as_secs());

        sleep(next).await;
    }
}

/// Keep the Vault token and the database lease alive in background tasks.
/// `tx` fires when either gives up, which shuts the server down.
///
/// # Errors
/// Returns an error if the renewal tasks cannot be set up.
#[instrument(skip(globals, tx))]
pub async fn try_renew(globals: &GlobalArgs, tx: mpsc::UnboundedSender<()>) -> Result<()> {
    tokio::spawn({
        let url = globals.vault_url.clone();
        let token = globals.vault_token.clone();
        let tx = tx.clone();

        async move {
            renew_loop("token", tx, || vault::renew_token(&url, &token, None)).await;
        }
    });

    tokio::spawn({
        let url = globals.vault_url.clone();
        let token = globals.vault_token.clone();
        let lease_id = globals.vault_db_lease_id.clone();
        let lease_duration = globals.vault_db_lease_duration;

        async move {
            renew_loop("DB lease", tx, || {
                vault::renew_db_lease(&url, &token, &lease_id, lease_duration)
            })
            .await;
        }
    });

    Ok(())
}
