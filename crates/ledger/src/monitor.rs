//! Background alerting loop and model training.
//!
//! Each iteration scans low-trust users for behavioral anomalies and scores
//! unchecked Pending deliveries for fraud. Alerts are written as `AI_ALERT`
//! blockchain logs.

use annsuraksha_core::LogAction;
use annsuraksha_scoring::{
    delivery_features, user_features, DeliveryRow, DeliverySample, Models, TrustRow,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::{ModelsConfig, MonitorConfig};
use crate::storage::{DeliveryRecord, NewLogEntry, Storage, UserRecord};

/// Alert type written for anomalous low-trust users.
pub const LOW_TRUST_ALERT: &str = "LOW_TRUST";

/// Alert type written for likely fraudulent deliveries.
pub const POTENTIAL_FRAUD_ALERT: &str = "POTENTIAL_FRAUD";

/// Outcome of one monitor iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Low-trust users examined.
    pub users_scanned: usize,
    /// `LOW_TRUST` alerts written.
    pub low_trust_alerts: usize,
    /// Pending deliveries scored.
    pub deliveries_checked: usize,
    /// `POTENTIAL_FRAUD` alerts written.
    pub fraud_alerts: usize,
}

/// Periodic low-trust and fraud scanner.
pub struct TrustMonitor {
    storage: Storage,
    models: Models,
    model_dir: Option<PathBuf>,
    config: MonitorConfig,
}

impl TrustMonitor {
    /// Create a monitor.
    ///
    /// When `model_dir` is set and `models` is unfitted, each backoff retries
    /// loading a snapshot from it.
    pub fn new(
        storage: Storage,
        models: Models,
        model_dir: Option<PathBuf>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            storage,
            models,
            model_dir,
            config,
        }
    }

    /// Models in use.
    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Run forever. Iteration errors are logged and followed by a backoff.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Trust monitor starting (poll: {}s, backoff: {}s)",
            self.config.poll_interval_secs, self.config.backoff_secs
        );

        loop {
            if !self.models.is_fitted() {
                self.reload_models();
                if !self.models.is_fitted() {
                    info!(
                        "Models not fitted, retrying in {}s",
                        self.config.backoff_secs
                    );
                    tokio::time::sleep(self.config.backoff()).await;
                    continue;
                }
            }

            match self.run_once(Utc::now()).await {
                Ok(report) => {
                    if report.low_trust_alerts + report.fraud_alerts > 0 {
                        info!(
                            low_trust = report.low_trust_alerts,
                            fraud = report.fraud_alerts,
                            "Monitor raised alerts"
                        );
                    } else {
                        debug!(?report, "Monitor iteration complete");
                    }
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
                Err(e) => {
                    warn!("Monitor iteration failed: {:#}", e);
                    tokio::time::sleep(self.config.backoff()).await;
                }
            }
        }
    }

    /// One low-trust scan followed by one delivery scan.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        self.scan_low_trust(now, &mut report).await?;
        self.scan_deliveries(&mut report).await?;
        Ok(report)
    }

    fn reload_models(&mut self) {
        if let Some(dir) = &self.model_dir {
            self.models = Models::load(*self.models.params(), dir);
        }
    }

    async fn scan_low_trust(&self, now: DateTime<Utc>, report: &mut ScanReport) -> Result<()> {
        let alerted_before = now - Duration::hours(self.config.alert_debounce_hours);
        let candidates = self
            .storage
            .low_trust_candidates(self.config.low_trust_threshold, alerted_before)
            .await?;

        for user in candidates {
            report.users_scanned += 1;
            let row = behavior_row(&self.storage, &user, now).await?;
            if !self.models.detect_trust_anomaly(&row) {
                continue;
            }

            self.storage
                .append_log(
                    &NewLogEntry::new(
                        LogAction::AiAlert,
                        json!({
                            "type": LOW_TRUST_ALERT,
                            "trust_score": user.trust_score,
                            "message": format!(
                                "Anomalous behavior for low-trust user {}",
                                user.name
                            ),
                        }),
                    )
                    .user(user.id),
                )
                .await?;
            self.storage.set_last_alert(user.id, now).await?;

            warn!(
                user_id = user.id,
                trust_score = user.trust_score,
                "Low-trust anomaly detected"
            );
            report.low_trust_alerts += 1;
        }

        Ok(())
    }

    async fn scan_deliveries(&self, report: &mut ScanReport) -> Result<()> {
        let pending = self
            .storage
            .unchecked_pending_deliveries(self.config.delivery_batch)
            .await?;

        for delivery in pending {
            let history: Vec<DeliveryRow> = self
                .storage
                .fraud_history(delivery.user_id, delivery.id)
                .await?
                .iter()
                .map(|d| delivery_features(&to_sample(d)))
                .collect();
            let candidate = delivery_features(&to_sample(&delivery));
            let probability = self.models.fraud_probability(&history, &candidate);

            if probability > self.config.fraud_threshold {
                self.storage
                    .append_log(
                        &NewLogEntry::new(
                            LogAction::AiAlert,
                            json!({
                                "type": POTENTIAL_FRAUD_ALERT,
                                "fraud_probability": probability,
                                "message": format!(
                                    "Delivery {} at {} deviates from the beneficiary's history",
                                    delivery.id, delivery.fps_code
                                ),
                            }),
                        )
                        .user(delivery.user_id)
                        .delivery(delivery.id),
                    )
                    .await?;

                warn!(
                    delivery_id = delivery.id,
                    probability, "Potential fraud detected"
                );
                report.fraud_alerts += 1;
            }

            self.storage
                .set_fraud_result(delivery.id, probability)
                .await?;
            report.deliveries_checked += 1;
        }

        Ok(())
    }
}

/// The parts of a stored delivery the estimators use.
pub fn to_sample(delivery: &DeliveryRecord) -> DeliverySample {
    DeliverySample {
        amount: delivery.amount as f64,
        item_count: delivery.items.len(),
        delivery_time: delivery.delivery_time,
        location: delivery.location.clone(),
    }
}

/// Behavior vector of a user as of `now`.
pub async fn behavior_row(
    storage: &Storage,
    user: &UserRecord,
    now: DateTime<Utc>,
) -> Result<TrustRow> {
    let samples: Vec<DeliverySample> = storage
        .deliveries_for_user(user.id)
        .await?
        .iter()
        .map(to_sample)
        .collect();
    let complaints = storage.count_complaints_by_user(user.id).await?;

    Ok(user_features(
        Some(user.trust_score),
        &samples,
        complaints.max(0) as usize,
        now,
    ))
}

/// Fit models on established users.
///
/// Users registered more than `min_account_age_days` ago (at most
/// `max_training_users`) with at least `min_user_deliveries` deliveries
/// contribute one trust row each and all of their deliveries.
pub async fn train_models<R: Rng>(
    storage: &Storage,
    config: &ModelsConfig,
    rng: &mut R,
) -> Result<Models> {
    let now = Utc::now();
    let cutoff = now - Duration::days(config.min_account_age_days);
    let users = storage
        .users_created_before(cutoff, config.max_training_users)
        .await?;

    let mut trust_rows = Vec::new();
    let mut delivery_rows = Vec::new();

    for user in &users {
        let deliveries = storage.deliveries_for_user(user.id).await?;
        if deliveries.len() < config.min_user_deliveries {
            continue;
        }

        let samples: Vec<DeliverySample> = deliveries.iter().map(to_sample).collect();
        let complaints = storage.count_complaints_by_user(user.id).await?;

        trust_rows.push(user_features(
            Some(user.trust_score),
            &samples,
            complaints.max(0) as usize,
            now,
        ));
        delivery_rows.extend(samples.iter().map(delivery_features));
    }

    info!(
        "Training on {} of {} established users ({} deliveries)",
        trust_rows.len(),
        users.len(),
        delivery_rows.len()
    );

    Models::train(config.params, &trust_rows, &delivery_rows, rng)
        .context("Failed to train models")
}

/// Load the snapshot in `config.dir`, training and saving one if absent.
pub async fn prepare_models<R: Rng>(
    storage: &Storage,
    config: &ModelsConfig,
    rng: &mut R,
) -> Result<Models> {
    let models = Models::load(config.params, &config.dir);
    if models.is_fitted() {
        return Ok(models);
    }

    let models = train_models(storage, config, rng).await?;
    models
        .save(&config.dir)
        .with_context(|| format!("Failed to save models to {}", config.dir.display()))?;
    Ok(models)
}
