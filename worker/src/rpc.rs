use anyhow::{Context, Result};
use common::{
    ErrorResponse, ReportStatusRequest, TaskAssignment, TaskKind, TaskOutcome, TaskRequest,
    WorkerId,
};
use reqwest::Client;
use tracing::warn;

/// Cliente de las dos llamadas RPC del master.
#[derive(Clone)]
pub struct MasterClient {
    client: Client,
    base_url: String,
    worker_id: WorkerId,
}

impl MasterClient {
    pub fn new(base_url: &str, worker_id: WorkerId) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            worker_id,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// RequestTask. Cualquier error acá es falla de comunicación.
    pub async fn request_task(&self) -> Result<TaskAssignment> {
        let url = format!("{}/api/v1/tasks/request", self.base_url);
        let assignment = self
            .client
            .post(&url)
            .json(&TaskRequest {
                worker_id: self.worker_id.clone(),
            })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?
            .json::<TaskAssignment>()
            .await?;
        Ok(assignment)
    }

    /// ReportStatus. Si el master rechaza el reporte (error de protocolo) lo
    /// logueamos y seguimos; solo falla si no se pudo hablar con el master.
    pub async fn report_status(
        &self,
        kind: TaskKind,
        task_id: u32,
        outcome: TaskOutcome,
    ) -> Result<()> {
        let url = format!("{}/api/v1/tasks/report", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&ReportStatusRequest {
                worker_id: self.worker_id.clone(),
                kind,
                task_id,
                outcome,
            })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_default();
            warn!(
                "master rechazó el reporte de {} {} (status {}): {}",
                kind, task_id, status, detail
            );
        }
        Ok(())
    }
}
