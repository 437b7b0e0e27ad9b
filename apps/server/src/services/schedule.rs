//! Weekly shift planning for doctors
//!
//! A week is planned slot by slot (working day x shift). For every slot the
//! active doctors are shuffled, then stable-sorted so the least loaded come
//! first and doctors already working that day go last; the first
//! `doctors_per_shift` under their weekly cap are assigned. Slots that cannot
//! be filled are reported back rather than failing the run.

use crate::{
    config::SchedulingConfig,
    db::{DoctorRepository, Repositories, ScheduleRepository},
    models::{doctor::NewSchedule, DoctorSchedule, Shift},
    Error, Result,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWeekRequest {
    /// Any date in the week; normalised to its Monday.
    pub week_start: NaiveDate,
    pub doctors_per_shift: Option<u32>,
    pub max_shifts_per_doctor: Option<u32>,
    #[serde(default)]
    pub overwrite: bool,
    /// Fixes the shuffle for reproducible plans.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfilledSlot {
    pub date: NaiveDate,
    pub shift: Shift,
    pub required: u32,
    pub assigned: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWeek {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub schedules: Vec<DoctorSchedule>,
    pub unfilled: Vec<UnfilledSlot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleListQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOffRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Inputs of a single planning run.
#[derive(Debug, Clone)]
pub struct WeekPlanInput<'a> {
    pub monday: NaiveDate,
    pub working_days: &'a [Weekday],
    pub doctors: &'a [Uuid],
    /// (doctor, date, shift) slots the doctor is on leave.
    pub leave: &'a HashSet<(Uuid, NaiveDate, Shift)>,
    pub doctors_per_shift: u32,
    pub max_shifts_per_doctor: u32,
}

pub fn plan_week(input: &WeekPlanInput<'_>, rng: &mut StdRng) -> (Vec<NewSchedule>, Vec<UnfilledSlot>) {
    let mut assigned_count: HashMap<Uuid, u32> = HashMap::new();
    let mut rows = Vec::new();
    let mut unfilled = Vec::new();

    for weekday in input.working_days {
        let date = input.monday + Duration::days(i64::from(weekday.num_days_from_monday()));
        let mut working_today: HashSet<Uuid> = HashSet::new();

        for shift in Shift::ALL {
            let mut candidates: Vec<Uuid> = input
                .doctors
                .iter()
                .copied()
                .filter(|id| !input.leave.contains(&(*id, date, shift)))
                .collect();
            candidates.shuffle(rng);
            candidates.sort_by_key(|id| {
                (
                    assigned_count.get(id).copied().unwrap_or(0),
                    working_today.contains(id),
                )
            });

            let picked: Vec<Uuid> = candidates
                .into_iter()
                .filter(|id| assigned_count.get(id).copied().unwrap_or(0) < input.max_shifts_per_doctor)
                .take(input.doctors_per_shift as usize)
                .collect();

            for id in &picked {
                *assigned_count.entry(*id).or_default() += 1;
                working_today.insert(*id);
                rows.push(NewSchedule {
                    doctor_id: *id,
                    date,
                    shift,
                    is_off: false,
                });
            }

            let assigned = picked.len() as u32;
            if assigned < input.doctors_per_shift {
                unfilled.push(UnfilledSlot {
                    date,
                    shift,
                    required: input.doctors_per_shift,
                    assigned,
                });
            }
        }
    }

    (rows, unfilled)
}

pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    doctors: Arc<dyn DoctorRepository>,
    config: SchedulingConfig,
}

impl ScheduleService {
    pub fn new(repos: &Repositories, config: SchedulingConfig) -> Self {
        Self {
            schedules: repos.schedules.clone(),
            doctors: repos.doctors.clone(),
            config,
        }
    }

    pub async fn generate_week(&self, request: GenerateWeekRequest) -> Result<GeneratedWeek> {
        let doctors_per_shift = request
            .doctors_per_shift
            .unwrap_or(self.config.doctors_per_shift);
        let max_shifts_per_doctor = request
            .max_shifts_per_doctor
            .unwrap_or(self.config.max_shifts_per_doctor_per_week);
        if doctors_per_shift == 0 || max_shifts_per_doctor == 0 {
            return Err(Error::Validation(
                "doctorsPerShift and maxShiftsPerDoctor must be greater than zero".to_string(),
            ));
        }
        let working_days = self.config.weekdays().map_err(Error::Internal)?;

        let monday = monday_of(request.week_start);
        let sunday = monday + Duration::days(6);

        let existing = self.schedules.list_between(monday, sunday, None).await?;
        let has_working_rows = existing.iter().any(|s| !s.is_off);
        if has_working_rows && !request.overwrite {
            return Err(Error::Conflict(format!(
                "A schedule already exists for the week of {monday}; pass overwrite to replace it"
            )));
        }

        let doctors: Vec<Uuid> = self.doctors.list(true).await?.iter().map(|d| d.id).collect();
        if doctors.is_empty() {
            return Err(Error::BusinessRule(
                "No active doctors available for scheduling".to_string(),
            ));
        }

        let leave: HashSet<(Uuid, NaiveDate, Shift)> = existing
            .iter()
            .filter(|s| s.is_off)
            .map(|s| (s.doctor_id, s.date, s.shift))
            .collect();

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (rows, unfilled) = plan_week(
            &WeekPlanInput {
                monday,
                working_days: &working_days,
                doctors: &doctors,
                leave: &leave,
                doctors_per_shift,
                max_shifts_per_doctor,
            },
            &mut rng,
        );

        let schedules = self.schedules.replace_working_rows(monday, sunday, rows).await?;

        if unfilled.is_empty() {
            tracing::info!(week_start = %monday, assigned = schedules.len(), "Week scheduled");
        } else {
            tracing::warn!(
                week_start = %monday,
                assigned = schedules.len(),
                unfilled = unfilled.len(),
                "Week scheduled with under-staffed shifts"
            );
        }

        Ok(GeneratedWeek {
            week_start: monday,
            week_end: sunday,
            schedules,
            unfilled,
        })
    }

    pub async fn list(&self, query: ScheduleListQuery) -> Result<Vec<DoctorSchedule>> {
        if query.to < query.from {
            return Err(Error::Validation(format!(
                "Range end {} is before range start {}",
                query.to, query.from
            )));
        }
        self.schedules
            .list_between(query.from, query.to, query.doctor_id)
            .await
    }

    pub async fn mark_off(&self, request: MarkOffRequest) -> Result<DoctorSchedule> {
        if self.doctors.find_by_id(request.doctor_id).await?.is_none() {
            return Err(Error::not_found("Doctor", request.doctor_id));
        }
        let row = self
            .schedules
            .mark_off(request.doctor_id, request.date, request.shift)
            .await?;
        tracing::info!(
            doctor_id = %request.doctor_id,
            date = %request.date,
            shift = %request.shift,
            "Doctor marked off"
        );
        Ok(row)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.schedules.delete(id).await? {
            return Err(Error::not_found("Schedule", id));
        }
        Ok(())
    }
}
