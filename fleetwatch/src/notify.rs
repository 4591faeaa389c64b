//! Helpdesk ticket dispatch for new occurrences. One ticket per machine.
//!
//! Delivery is best effort: tickets are posted concurrently, the response is
//! never inspected and a failed POST is only logged.

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::condition::Condition;
use crate::diff::OccurrenceSet;

pub const DEFAULT_NOTIFY_URL: &str = "http://10.10.10.61:1000/api/enviar-email";
pub const DEFAULT_RECIPIENT: &str = "chamados@bugbusters.com.br";

const REQUESTER: &str = "SISTEMA DE MONITORAMENTO";
const TICKET_KIND: &str = "Incidente";
const TICKET_CATEGORY: &str = "Hardware";

/// Body accepted by the ticket endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketPayload {
    pub to: String,
    pub requerente: String,
    pub titulo: String,
    pub tipo: String,
    pub categoria: String,
    pub chamado: String,
}

impl TicketPayload {
    pub fn new(recipient: &str, machine: &str, conditions: &[Condition]) -> Self {
        Self {
            to: recipient.to_string(),
            requerente: REQUESTER.to_string(),
            titulo: format!("PROBLEMA COM {machine}"),
            tipo: TICKET_KIND.to_string(),
            categoria: TICKET_CATEGORY.to_string(),
            chamado: ticket_summary(machine, conditions),
        }
    }
}

/// Human-readable body of the ticket, one bullet per condition.
pub fn ticket_summary(machine: &str, conditions: &[Condition]) -> String {
    let bullets: Vec<String> = conditions.iter().map(|c| format!("   - {c}")).collect();
    format!(
        "Foi identificado um problema na estação {machine}.\n\
         O sistema identificou um ou mais problemas a seguir:\n\n\
         {}\n\n\
         Solicitada a verificação dessas anomalias.",
        bullets.join("\n")
    )
}

#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    endpoint: String,
    recipient: String,
    dry_run: bool,
}

impl Notifier {
    pub fn new(endpoint: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            recipient: recipient.into(),
            dry_run: false,
        }
    }

    /// Build and log tickets without posting them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn payloads(&self, diff: &OccurrenceSet) -> Vec<TicketPayload> {
        diff.iter()
            .map(|(machine, conditions)| TicketPayload::new(&self.recipient, machine, conditions))
            .collect()
    }

    /// Post one ticket per machine in `diff`. Returns the payloads that were
    /// built, whether or not their delivery succeeded.
    pub async fn dispatch(&self, diff: &OccurrenceSet) -> Vec<TicketPayload> {
        if diff.is_empty() {
            info!("no new occurrences, no ticket sent");
            return Vec::new();
        }
        let payloads = self.payloads(diff);

        if self.dry_run {
            info!(tickets = payloads.len(), "dry run, tickets not posted");
        } else {
            join_all(payloads.iter().map(|p| self.post(p))).await;
        }

        match serde_json::to_string_pretty(&payloads) {
            Ok(js) => info!("tickets issued:\n{js}"),
            Err(e) => debug!(error = %e, "could not render ticket summary"),
        }
        payloads
    }

    async fn post(&self, payload: &TicketPayload) {
        let sent = self.http.post(&self.endpoint).json(payload).send().await;
        if let Err(e) = sent {
            error!(title = %payload.titulo, endpoint = %self.endpoint, error = %e, "ticket delivery failed");
        }
    }
}
