//! Patient treatments: business rules, cost, queries and reporting

pub mod business;
pub mod cost;
pub mod query;
pub mod stats;

pub use business::TreatmentService;
pub use cost::{CostBreakdown, CostCalculator};
pub use query::TreatmentQueryService;
pub use stats::TreatmentStatsService;

use crate::{
    db::{ProtocolRepository, Repositories},
    models::{CustomMedication, Medicine, ProtocolWithMedicines},
    Error, Result,
};
use chrono::NaiveDate;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

/// A regimen with its protocol loaded and priced.
#[derive(Debug, Clone)]
pub struct PricedRegimen {
    pub protocol: Option<ProtocolWithMedicines>,
    pub cost: CostBreakdown,
}

impl PricedRegimen {
    /// Effective medicine names after custom lines replaced protocol lines.
    pub fn medicine_names(&self) -> Vec<String> {
        self.cost.lines.iter().map(|l| l.name.clone()).collect()
    }
}

/// Loads the protocol and catalogue entries a regimen refers to and prices it.
#[derive(Clone)]
pub struct RegimenPricer {
    protocols: Arc<dyn ProtocolRepository>,
    calculator: CostCalculator,
}

impl RegimenPricer {
    pub fn new(repos: &Repositories, default_duration_days: u32) -> Self {
        Self {
            protocols: repos.protocols.clone(),
            calculator: CostCalculator::new(default_duration_days),
        }
    }

    pub async fn load_protocol(&self, protocol_id: Uuid) -> Result<ProtocolWithMedicines> {
        self.protocols
            .find_protocol(protocol_id)
            .await?
            .ok_or_else(|| Error::not_found("Protocol", protocol_id))
    }

    async fn catalogue(&self, custom: &[CustomMedication]) -> Result<HashMap<Uuid, Medicine>> {
        let mut ids: Vec<Uuid> = custom.iter().filter_map(|c| c.medicine_id).collect();
        ids.sort();
        ids.dedup();
        let found = self.protocols.find_medicines(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|m| m.id == **id)) {
            return Err(Error::not_found("Medicine", missing));
        }
        Ok(found.into_iter().map(|m| (m.id, m)).collect())
    }

    pub async fn price(
        &self,
        protocol_id: Option<Uuid>,
        custom: &[CustomMedication],
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<PricedRegimen> {
        let protocol = match protocol_id {
            Some(id) => Some(self.load_protocol(id).await?),
            None => None,
        };
        let catalogue = self.catalogue(custom).await?;
        let cost = self
            .calculator
            .calculate(protocol.as_ref(), custom, &catalogue, start_date, end_date)?;
        Ok(PricedRegimen { protocol, cost })
    }
}

/// Custom medications only layer on top of a protocol, and a treatment needs one or the other.
pub(crate) fn check_regimen_shape(
    protocol_id: Option<Uuid>,
    custom: &[CustomMedication],
) -> Result<()> {
    match (protocol_id, custom.is_empty()) {
        (None, false) => Err(Error::BusinessRule(
            "Custom medications require a treatment protocol".to_string(),
        )),
        (None, true) => Err(Error::BusinessRule(
            "A treatment needs a protocol or custom medications".to_string(),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn check_dates(start_date: NaiveDate, end_date: Option<NaiveDate>) -> Result<()> {
    match end_date {
        Some(end) if end < start_date => Err(Error::Validation(format!(
            "End date {end} is before start date {start_date}"
        ))),
        _ => Ok(()),
    }
}
