use crate::{
    logbuf::LogBuffer,
    pricing::{Proposal, propose},
    settings::SettingsStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

/// In-memory registry of bulk pricing passes. Jobs do not survive a restart.
#[derive(Clone)]
pub struct BulkJobs {
    jobs: Arc<Mutex<HashMap<Uuid, BulkJob>>>,
    settings: SettingsStore,
    logs: LogBuffer,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct JobSummary {
    pub proposed: usize,
    pub skipped: usize,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub id: String,
    pub store_id: String,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub proposals: Vec<Proposal>,
    pub summary: Option<JobSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkJobs {
    pub fn new(settings: SettingsStore, logs: LogBuffer) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            settings,
            logs,
        }
    }

    /// Registers a queued job and detaches the task that runs it.
    ///
    /// An empty or absent `skus` list means every SKU in the store's settings.
    pub async fn start(&self, store_id: String, skus: Option<Vec<String>>) -> (Uuid, JoinHandle<()>) {
        let id = Uuid::new_v4();
        let now = Utc::now();
        {
            let mut guard = self.jobs.lock().await;
            guard.insert(
                id,
                BulkJob {
                    id: id.to_string(),
                    store_id: store_id.clone(),
                    status: JobStatus::Queued,
                    processed: 0,
                    total: 0,
                    proposals: Vec::new(),
                    summary: None,
                    error: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        self.logs
            .push(format!("bulk {id} queued for store {store_id}"))
            .await;

        let worker = self.clone();
        let handle = tokio::spawn(async move {
            worker.run(id, store_id, skus).await;
        });
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<BulkJob> {
        let guard = self.jobs.lock().await;
        guard.get(&id).cloned()
    }

    async fn run(&self, id: Uuid, store_id: String, skus: Option<Vec<String>>) {
        self.update(id, |job| job.status = JobStatus::Running).await;

        let settings = match self.settings.load(&store_id).await {
            Ok(settings) => settings,
            Err(err) => {
                let message = err.to_string();
                self.update(id, |job| {
                    job.status = JobStatus::Error;
                    job.error = Some(message.clone());
                })
                .await;
                self.logs
                    .push(format!("bulk {id} failed: {message}"))
                    .await;
                return;
            }
        };

        let skus: Vec<String> = match skus {
            Some(list) if list.iter().any(|s| !s.trim().is_empty()) => list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => settings.keys().cloned().collect(),
        };
        let total = skus.len();
        self.update(id, |job| job.total = total).await;
        self.logs
            .push(format!("bulk {id} running: {total} skus for store {store_id}"))
            .await;

        let mut proposed = 0;
        for sku in &skus {
            let proposal = propose(sku, settings.get(sku));
            if proposal.is_some() {
                proposed += 1;
            }
            self.update(id, |job| {
                if let Some(proposal) = proposal {
                    job.proposals.push(proposal);
                }
                job.processed += 1;
            })
            .await;
            tokio::task::yield_now().await;
        }

        let summary = JobSummary {
            proposed,
            skipped: total - proposed,
        };
        self.update(id, |job| {
            job.status = JobStatus::Done;
            job.summary = Some(summary);
        })
        .await;
        crate::metrics::bulk_finished(total, proposed);
        self.logs
            .push(format!(
                "bulk {id} done: {proposed} proposed, {} skipped",
                summary.skipped
            ))
            .await;
    }

    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut BulkJob)) {
        let mut guard = self.jobs.lock().await;
        if let Some(job) = guard.get_mut(&id) {
            apply(job);
            job.updated_at = Utc::now();
        }
    }
}
