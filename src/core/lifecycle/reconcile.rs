use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::LifecycleComponent;
use crate::core::store::Store;

/// Clears active failures that already have a resolved twin. Runs once at
/// start and then on `cron`.
pub struct ReconcileSweep {
    store: Arc<Store>,
    cron: String,
    scheduler: JobScheduler,
}

impl ReconcileSweep {
    pub fn new(store: Arc<Store>, cron: String, scheduler: JobScheduler) -> Self {
        Self {
            store,
            cron,
            scheduler,
        }
    }

    pub async fn run_once(store: &Store) -> Result<usize> {
        let removed = store.reconcile_resolved().await?;
        if removed > 0 {
            info!("Reconcile sweep removed {} stale active failures", removed);
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for ReconcileSweep {
    async fn on_init(&mut self) -> Result<()> {
        let store = self.store.clone();
        match Job::new_async(self.cron.as_str(), move |_uuid, mut _l| {
            let store = store.clone();
            Box::pin(async move {
                if let Err(e) = ReconcileSweep::run_once(&store).await {
                    error!("Reconcile sweep failed: {}", e);
                }
            })
        }) {
            Ok(job) => {
                self.scheduler.add(job).await?;
                info!("Reconcile sweep scheduled: {}", self.cron);
            }
            Err(e) => error!("Invalid reconcile_cron '{}': {}", self.cron, e),
        }
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        Self::run_once(&self.store).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;
    use crate::core::store::types::{FailureDraft, ResolvedDraft};

    #[tokio::test]
    async fn start_clears_leftover_active_rows() {
        let store = Arc::new(test_store());
        let active = store
            .insert_failure(
                "u-1",
                FailureDraft {
                    description: "נשאר מאחור".into(),
                    urgency: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .insert_resolved_failure(
                "u-1",
                ResolvedDraft {
                    id: Some(active.id.clone()),
                    failure_number: active.failure_number.clone(),
                    description: active.description.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let scheduler = JobScheduler::new().await.unwrap();
        let mut sweep = ReconcileSweep::new(store.clone(), "0 */10 * * * *".into(), scheduler);
        sweep.on_init().await.unwrap();
        sweep.on_start().await.unwrap();
        assert!(store.list_active_failures("u-1").await.unwrap().is_empty());
        assert_eq!(store.list_resolved_failures("u-1").await.unwrap().len(), 1);
    }
}
