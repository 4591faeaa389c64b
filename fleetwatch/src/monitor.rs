//! Run orchestration: roster, polling cycles, diff, persistence, tickets.
//!
//! One run walks `Init -> RosterFetched -> Polling -> Diffed -> Persisted ->
//! Notified -> Done`. Cycles run one after another; within a cycle machines
//! are fetched concurrently and their results are folded into the run
//! context on this task in roster order, so the accumulator and the history
//! file only ever have one writer.

use chrono::{Local, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::config::Settings;
use crate::diff::{diff, OccurrenceSet};
use crate::error::Result;
use crate::history::IncidentHistory;
use crate::inventory::InventoryClient;
use crate::notify::{Notifier, TicketPayload};
use crate::store::StateStore;
use crate::thresholds::{evaluate, StalenessPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    RosterFetched,
    Polling,
    Diffed,
    Persisted,
    Notified,
    Done,
}

/// Everything one run accumulates. Later cycles overwrite a machine's
/// entry in `current` whenever they find conditions for it again.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub phase: Phase,
    pub roster_size: usize,
    /// Successful record fetches, summed over cycles.
    pub polled: usize,
    /// Fetches that exhausted the attempt ceiling, summed over cycles.
    pub skipped: usize,
    pub incidents_appended: usize,
    pub current: OccurrenceSet,
    pub diff: OccurrenceSet,
    pub tickets: Vec<TicketPayload>,
}

impl RunReport {
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "run phase");
        self.phase = phase;
    }
}

pub struct Monitor {
    inventory: InventoryClient,
    store: StateStore,
    notifier: Notifier,
    staleness: StalenessPolicy,
    cycles: u32,
    concurrency: usize,
}

impl Monitor {
    pub fn new(inventory: InventoryClient, store: StateStore, notifier: Notifier) -> Self {
        Self {
            inventory,
            store,
            notifier,
            staleness: StalenessPolicy::default(),
            cycles: 1,
            concurrency: 1,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let inventory = InventoryClient::new(
            settings.inventory_base()?,
            settings.retry_policy(),
            settings.record_cap,
        )?;
        let notifier = Notifier::new(&settings.notify_url, &settings.recipient)
            .with_dry_run(settings.dry_run);
        Ok(Self::new(inventory, StateStore::new(&settings.state_dir), notifier)
            .with_staleness(settings.staleness()?)
            .with_cycles(settings.cycles)
            .with_concurrency(settings.concurrency))
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// One full run. Persistence failures abort it; fetch and ticket
    /// failures do not.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        let exceptions = self.store.load_exceptions()?;
        let history = self.store.history();

        let names: Vec<String> = self
            .inventory
            .fetch_roster()
            .await
            .into_iter()
            .map(|m| m.name)
            .collect();
        report.roster_size = names.len();
        report.enter(Phase::RosterFetched);

        report.enter(Phase::Polling);
        for cycle in 1..=self.cycles {
            info!(cycle, cycles = self.cycles, "cycle started");
            self.poll_cycle(&names, &history, &mut report).await?;
        }

        let last_known = self.store.load_last_known()?;
        report.diff = diff(&report.current, &last_known, &exceptions);
        if report.diff.is_empty() {
            info!("no new occurrences detected");
        } else {
            info!(
                machines = report.diff.len(),
                conditions = report.diff.condition_count(),
                "new occurrences detected"
            );
        }
        report.enter(Phase::Diffed);

        self.store.store_new_occurrences(&report.diff)?;
        self.store.store_last_known(&report.current)?;
        report.enter(Phase::Persisted);

        report.tickets = self.notifier.dispatch(&report.diff).await;
        report.enter(Phase::Notified);

        report.enter(Phase::Done);
        Ok(report)
    }

    async fn poll_cycle(
        &self,
        names: &[String],
        history: &IncidentHistory,
        report: &mut RunReport,
    ) -> Result<()> {
        let inventory = &self.inventory;
        let mut fetches = stream::iter(names)
            .map(|alias| async move { (alias, inventory.fetch_records(alias).await) })
            .buffered(self.concurrency);

        while let Some((alias, records)) = fetches.next().await {
            if records.is_empty() {
                report.skipped += 1;
                continue;
            }
            report.polled += 1;

            let evaluation = evaluate(&records, alias, Local::now().naive_local(), &self.staleness);
            if !evaluation.is_critical() {
                debug!(alias = %alias, "no critical conditions");
                continue;
            }
            history.append(alias, &evaluation.conditions, Utc::now())?;
            report.incidents_appended += 1;
            report.current.record(alias.clone(), evaluation.conditions);
        }
        Ok(())
    }
}
