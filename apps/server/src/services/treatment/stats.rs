//! Treatment reporting

use crate::{
    db::{DoctorRepository, ProtocolRepository, Repositories, ScheduleRepository, TreatmentRepository},
    models::{treatment::TreatmentFilter, PatientTreatment},
    Error, Result,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolCount {
    /// `None` for treatments built from custom medications alone.
    pub protocol_id: Option<Uuid>,
    pub protocol_name: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentStats {
    pub total: u64,
    pub open: u64,
    pub ended: u64,
    pub by_protocol: Vec<ProtocolCount>,
    pub total_cost: Decimal,
    pub average_cost: Decimal,
    /// Treatments started per calendar month, keyed `YYYY-MM`.
    pub started_per_month: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorWorkload {
    pub doctor_id: Uuid,
    pub full_name: String,
    pub open_treatments: u64,
    pub total_treatments: u64,
    pub scheduled_shifts: u64,
}

/// Aggregate a set of treatments. Protocol names are resolved by the caller.
pub fn summarize(treatments: &[PatientTreatment], today: NaiveDate) -> TreatmentStats {
    let total = treatments.len() as u64;
    let open = treatments.iter().filter(|t| t.is_open_on(today)).count() as u64;

    let mut per_protocol: BTreeMap<Option<Uuid>, u64> = BTreeMap::new();
    let mut started_per_month: BTreeMap<String, u64> = BTreeMap::new();
    let mut total_cost = Decimal::ZERO;
    for t in treatments {
        *per_protocol.entry(t.protocol_id).or_default() += 1;
        let month = format!("{:04}-{:02}", t.start_date.year(), t.start_date.month());
        *started_per_month.entry(month).or_default() += 1;
        total_cost += t.total_cost;
    }

    let mut by_protocol: Vec<ProtocolCount> = per_protocol
        .into_iter()
        .map(|(protocol_id, count)| ProtocolCount {
            protocol_id,
            protocol_name: None,
            count,
        })
        .collect();
    by_protocol.sort_by(|a, b| b.count.cmp(&a.count));

    let average_cost = if total == 0 {
        Decimal::ZERO
    } else {
        (total_cost / Decimal::from(total))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    TreatmentStats {
        total,
        open,
        ended: total - open,
        by_protocol,
        total_cost,
        average_cost,
        started_per_month,
    }
}

fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    match (from, to) {
        (Some(from), Some(to)) if to < from => Err(Error::Validation(format!(
            "Range end {to} is before range start {from}"
        ))),
        _ => Ok(()),
    }
}

pub struct TreatmentStatsService {
    treatments: Arc<dyn TreatmentRepository>,
    protocols: Arc<dyn ProtocolRepository>,
    doctors: Arc<dyn DoctorRepository>,
    schedules: Arc<dyn ScheduleRepository>,
}

impl TreatmentStatsService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            treatments: repos.treatments.clone(),
            protocols: repos.protocols.clone(),
            doctors: repos.doctors.clone(),
            schedules: repos.schedules.clone(),
        }
    }

    /// Statistics over treatments started within `[from, to]`.
    pub async fn treatment_stats(&self, range: DateRangeQuery) -> Result<TreatmentStats> {
        check_range(range.from, range.to)?;
        let filter = TreatmentFilter {
            start_from: range.from,
            start_to: range.to,
            ..TreatmentFilter::default()
        };
        let treatments = self.treatments.list_all(&filter).await?;
        let mut stats = summarize(&treatments, Utc::now().date_naive());

        let protocols = self.protocols.list_protocols().await?;
        for entry in &mut stats.by_protocol {
            entry.protocol_name = entry
                .protocol_id
                .and_then(|id| protocols.iter().find(|p| p.id == id))
                .map(|p| p.name.clone());
        }
        Ok(stats)
    }

    /// Per active doctor: treatments started in range, currently open ones and
    /// working shifts scheduled in range.
    pub async fn doctor_workload(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DoctorWorkload>> {
        check_range(Some(from), Some(to))?;
        let today = Utc::now().date_naive();
        let doctors = self.doctors.list(true).await?;
        let schedules = self.schedules.list_between(from, to, None).await?;

        let mut workloads = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let treatments = self
                .treatments
                .list_all(&TreatmentFilter {
                    doctor_id: Some(doctor.id),
                    ..TreatmentFilter::default()
                })
                .await?;
            let total_treatments = treatments
                .iter()
                .filter(|t| t.start_date >= from && t.start_date <= to)
                .count() as u64;
            let open_treatments = treatments.iter().filter(|t| t.is_open_on(today)).count() as u64;
            let scheduled_shifts = schedules
                .iter()
                .filter(|s| s.doctor_id == doctor.id && !s.is_off)
                .count() as u64;

            workloads.push(DoctorWorkload {
                doctor_id: doctor.id,
                full_name: doctor.full_name,
                open_treatments,
                total_treatments,
                scheduled_shifts,
            });
        }

        workloads.sort_by(|a, b| {
            b.open_treatments
                .cmp(&a.open_treatments)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(workloads)
    }
}
