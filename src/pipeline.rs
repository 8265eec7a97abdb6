//! Stage sequencing for one pipeline run.
//!
//! Stages always run in this order:
//! ingest/audit/archive (per snapshot) → union → transform → mart → export.
//! Per-entity accumulators live in a [`RunContext`] created for the run and
//! dropped with it; nothing is shared between runs.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::{
    audit::AuditRecord,
    config::{EntityKind, PipelineConfig},
    error::Result,
    export::{self, MART_EXPORT_STEM},
    frame::Table,
    ingest::IngestionAuditor,
    mart::{MartBuilder, MartInputs, MartReport},
    transform::{TransformReport, Transformer},
    union::union_all,
};

/// Mutable state of one run: the per-entity snapshot accumulators and the
/// audit records written so far.
#[derive(Debug, Default)]
pub struct RunContext {
    accumulators: BTreeMap<EntityKind, Vec<Table>>,
    audits: Vec<(String, AuditRecord)>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, kind: EntityKind, table: Table) {
        self.accumulators.entry(kind).or_default().push(table);
    }

    pub fn snapshots(&self, kind: EntityKind) -> &[Table] {
        self.accumulators
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn record_audit(&mut self, day: &str, record: AuditRecord) {
        self.audits.push((day.to_string(), record));
    }

    pub fn audits(&self) -> &[(String, AuditRecord)] {
        &self.audits
    }
}

/// The four entities after union and transform.
#[derive(Debug, Clone)]
pub struct TransformedEntities {
    pub items: Table,
    pub customers: Table,
    pub order_headers: Table,
    pub order_lines: Table,
}

impl TransformedEntities {
    pub fn get(&self, kind: EntityKind) -> &Table {
        match kind {
            EntityKind::Items => &self.items,
            EntityKind::Customers => &self.customers,
            EntityKind::OrderHeaders => &self.order_headers,
            EntityKind::OrderLines => &self.order_lines,
        }
    }

    pub fn mart_inputs(&self) -> MartInputs<'_> {
        MartInputs {
            items: &self.items,
            customers: &self.customers,
            order_headers: &self.order_headers,
            order_lines: &self.order_lines,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub day: String,
    pub numberrow_treatment: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub entity: EntityKind,
    pub unioned_rows: usize,
    pub transform: TransformReport,
}

/// Counts collected across a run, serializable for `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub snapshots: Vec<SnapshotSummary>,
    pub entities: Vec<EntitySummary>,
    pub mart: MartReport,
}

#[derive(Debug)]
pub struct RunOutput {
    pub entities: TransformedEntities,
    pub mart: Table,
    pub report: RunReport,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunOutput> {
        self.config.validate()?;
        let mut context = RunContext::new();
        self.ingest_all(&mut context)?;
        let (entities, summaries) = self.union_and_transform(&context)?;
        let (mart, mart_report) = MartBuilder.build(entities.mart_inputs())?;

        if let Some(path) = &self.config.mart_output {
            export::write_csv(path, &mart, self.config.delimiter)?;
            info!("Wrote {} mart row(s) to {:?}", mart.row_count(), path);
        }
        if self.config.export.enabled {
            let mut tables = EntityKind::ALL
                .iter()
                .map(|kind| (kind.export_stem(), entities.get(*kind)))
                .collect::<Vec<_>>();
            tables.push((MART_EXPORT_STEM, &mart));
            export::export_tables(&self.config.export, self.config.delimiter, &tables)?;
        }

        let report = RunReport {
            snapshots: context
                .audits()
                .iter()
                .map(|(day, record)| SnapshotSummary {
                    day: day.clone(),
                    numberrow_treatment: record.numberrow_treatment,
                    status: record.status.to_string(),
                })
                .collect(),
            entities: summaries,
            mart: mart_report,
        };
        Ok(RunOutput {
            entities,
            mart,
            report,
        })
    }

    /// Runs the ingestion auditor over every configured snapshot in order.
    pub fn ingest_all(&self, context: &mut RunContext) -> Result<()> {
        let auditor = IngestionAuditor::from_config(&self.config)?;
        for snapshot in &self.config.snapshots {
            auditor.ingest(snapshot, context)?;
        }
        Ok(())
    }

    pub fn union_and_transform(
        &self,
        context: &RunContext,
    ) -> Result<(TransformedEntities, Vec<EntitySummary>)> {
        let mut summaries = Vec::with_capacity(EntityKind::ALL.len());
        let entities = TransformedEntities {
            items: self.prepare_entity(context, EntityKind::Items, &mut summaries)?,
            customers: self.prepare_entity(context, EntityKind::Customers, &mut summaries)?,
            order_headers: self.prepare_entity(context, EntityKind::OrderHeaders, &mut summaries)?,
            order_lines: self.prepare_entity(context, EntityKind::OrderLines, &mut summaries)?,
        };
        Ok((entities, summaries))
    }

    fn prepare_entity(
        &self,
        context: &RunContext,
        kind: EntityKind,
        summaries: &mut Vec<EntitySummary>,
    ) -> Result<Table> {
        let unioned = union_all(context.snapshots(kind))?;
        let transformer = Transformer::for_entity(&self.config, self.config.entities.get(kind));
        let (table, report) = transformer.apply(&unioned)?;
        info!(
            "{kind}: {} unioned row(s) -> {} after transform",
            unioned.row_count(),
            table.row_count()
        );
        summaries.push(EntitySummary {
            entity: kind,
            unioned_rows: unioned.row_count(),
            transform: report,
        });
        Ok(table)
    }
}
