//! In-process store implementing every repository trait.
//!
//! Backs `database.url = "memory://"` and the integration tests. All tables sit
//! behind one mutex, so each trait method is atomic the same way a Postgres
//! transaction is. Unique and foreign-key constraints from the migrations are
//! mirrored where the services rely on them.

use crate::{
    db::traits::{
        BlogRepository, DoctorRepository, MeetingRepository, PaymentRepository,
        ProtocolRepository, ScheduleRepository, TreatmentRepository,
    },
    models::{
        blog::{BlogFilter, NewBlog},
        doctor::{NewDoctor, NewSchedule},
        meeting::{MeetingFilter, NewMeetingRecord},
        payment::{GatewayReceipt, NewOrder},
        protocol::{NewMedicine, NewProtocol, ProtocolMedicineLine},
        treatment::{NewTreatment, TreatmentFilter},
        Blog, Doctor, DoctorSchedule, MeetingRecord, Medicine, Order, OrderStatus, PageRequest,
        PatientTreatment, Payment, PaymentStatus, ProtocolMedicine, ProtocolWithMedicines, Shift,
        TreatmentProtocol, TreatmentStatus,
    },
    Error, Result,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    treatments: Vec<PatientTreatment>,
    medicines: Vec<Medicine>,
    protocols: Vec<TreatmentProtocol>,
    protocol_medicines: Vec<ProtocolMedicine>,
    doctors: Vec<Doctor>,
    schedules: Vec<DoctorSchedule>,
    meetings: Vec<MeetingRecord>,
    blogs: Vec<Blog>,
    orders: Vec<Order>,
    payments: Vec<Payment>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half-applied write:
        // every method validates before it mutates.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Tables {
    fn protocol_with_medicines(&self, protocol: &TreatmentProtocol) -> Result<ProtocolWithMedicines> {
        let medicines = self
            .protocol_medicines
            .iter()
            .filter(|pm| pm.protocol_id == protocol.id)
            .map(|pm| {
                let medicine = self
                    .medicines
                    .iter()
                    .find(|m| m.id == pm.medicine_id)
                    .cloned()
                    .ok_or_else(|| {
                        Error::Internal(format!("Dangling medicine {} in protocol", pm.medicine_id))
                    })?;
                Ok(ProtocolMedicineLine {
                    item: pm.clone(),
                    medicine,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ProtocolWithMedicines {
            protocol: protocol.clone(),
            medicines,
        })
    }

    fn insert_treatment(&mut self, new: NewTreatment) -> Result<PatientTreatment> {
        if !self.doctors.iter().any(|d| d.id == new.doctor_id) {
            return Err(Error::not_found("Doctor", new.doctor_id));
        }
        if let Some(protocol_id) = new.protocol_id {
            if !self.protocols.iter().any(|p| p.id == protocol_id) {
                return Err(Error::not_found("Protocol", protocol_id));
            }
        }
        let now = Utc::now();
        let treatment = PatientTreatment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            protocol_id: new.protocol_id,
            custom_medications: new.custom_medications,
            start_date: new.start_date,
            end_date: new.end_date,
            total_cost: new.total_cost,
            status: TreatmentStatus::Active,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        self.treatments.push(treatment.clone());
        Ok(treatment)
    }
}

fn sort_treatments(items: &mut [PatientTreatment], newest_first: bool) {
    items.sort_by(|a, b| {
        let ord = a
            .start_date
            .cmp(&b.start_date)
            .then(a.created_at.cmp(&b.created_at));
        if newest_first {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn shift_rank(shift: Shift) -> u8 {
    match shift {
        Shift::Morning => 0,
        Shift::Afternoon => 1,
    }
}

#[async_trait]
impl TreatmentRepository for InMemoryStore {
    async fn create(&self, new: NewTreatment, today: NaiveDate) -> Result<PatientTreatment> {
        let mut tables = self.lock();
        if let Some(open) = tables
            .treatments
            .iter()
            .find(|t| t.patient_id == new.patient_id && t.is_open_on(today))
        {
            return Err(Error::Conflict(format!(
                "Patient {} already has an open treatment ({})",
                new.patient_id, open.id
            )));
        }
        tables.insert_treatment(new)
    }

    async fn create_replacing_open(
        &self,
        new: NewTreatment,
        today: NaiveDate,
        close_on: NaiveDate,
    ) -> Result<(PatientTreatment, Vec<Uuid>)> {
        let mut tables = self.lock();

        if !tables.doctors.iter().any(|d| d.id == new.doctor_id) {
            return Err(Error::not_found("Doctor", new.doctor_id));
        }
        let to_close: Vec<Uuid> = tables
            .treatments
            .iter()
            .filter(|t| t.patient_id == new.patient_id && t.is_open_on(today))
            .map(|t| t.id)
            .collect();
        // Mirror the end >= start CHECK before touching anything.
        if tables
            .treatments
            .iter()
            .any(|t| to_close.contains(&t.id) && close_on < t.start_date)
        {
            return Err(Error::BusinessRule(
                "Replaced treatment would end before it started".to_string(),
            ));
        }

        let created = tables.insert_treatment(new)?;
        let now = Utc::now();
        for t in tables.treatments.iter_mut() {
            if to_close.contains(&t.id) {
                t.status = TreatmentStatus::Completed;
                t.end_date = Some(close_on);
                t.updated_at = now;
            }
        }
        Ok((created, to_close))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PatientTreatment>> {
        Ok(self.lock().treatments.iter().find(|t| t.id == id).cloned())
    }

    async fn find_open_for_patient(
        &self,
        patient_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PatientTreatment>> {
        let mut open: Vec<_> = self
            .lock()
            .treatments
            .iter()
            .filter(|t| t.patient_id == patient_id && t.is_open_on(today))
            .cloned()
            .collect();
        sort_treatments(&mut open, false);
        Ok(open)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<PatientTreatment>> {
        let mut items: Vec<_> = self
            .lock()
            .treatments
            .iter()
            .filter(|t| t.patient_id == patient_id)
            .cloned()
            .collect();
        sort_treatments(&mut items, false);
        Ok(items)
    }

    async fn search(
        &self,
        filter: &TreatmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<PatientTreatment>, i64)> {
        let mut matching: Vec<_> = self
            .lock()
            .treatments
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_treatments(&mut matching, filter.newest_first);
        let total = matching.len() as i64;
        Ok((page.apply(&matching), total))
    }

    async fn list_all(&self, filter: &TreatmentFilter) -> Result<Vec<PatientTreatment>> {
        let mut matching: Vec<_> = self
            .lock()
            .treatments
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_treatments(&mut matching, false);
        Ok(matching)
    }

    async fn update(&self, treatment: &PatientTreatment, today: NaiveDate) -> Result<PatientTreatment> {
        let mut tables = self.lock();
        if treatment.is_open_on(today) {
            if let Some(open) = tables.treatments.iter().find(|t| {
                t.patient_id == treatment.patient_id && t.id != treatment.id && t.is_open_on(today)
            }) {
                return Err(Error::Conflict(format!(
                    "Patient {} already has an open treatment ({})",
                    treatment.patient_id, open.id
                )));
            }
        }
        let slot = tables
            .treatments
            .iter_mut()
            .find(|t| t.id == treatment.id)
            .ok_or_else(|| Error::not_found("Treatment", treatment.id))?;
        let mut updated = treatment.clone();
        updated.patient_id = slot.patient_id;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn end(
        &self,
        id: Uuid,
        end_date: NaiveDate,
        status: TreatmentStatus,
    ) -> Result<PatientTreatment> {
        let mut tables = self.lock();
        let slot = tables
            .treatments
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::not_found("Treatment", id))?;
        slot.end_date = Some(end_date);
        slot.status = status;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.treatments.len();
        tables.treatments.retain(|t| t.id != id);
        Ok(tables.treatments.len() != before)
    }
}

#[async_trait]
impl ProtocolRepository for InMemoryStore {
    async fn create_protocol(&self, new: NewProtocol) -> Result<ProtocolWithMedicines> {
        let mut tables = self.lock();
        if tables.protocols.iter().any(|p| p.name == new.name) {
            return Err(Error::Conflict(format!("Protocol '{}' already exists", new.name)));
        }
        if let Some(missing) = new
            .medicines
            .iter()
            .find(|line| !tables.medicines.iter().any(|m| m.id == line.medicine_id))
        {
            return Err(Error::not_found("Medicine", missing.medicine_id));
        }

        let protocol = TreatmentProtocol {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            category: new.category,
            duration_days: new.duration_days,
            created_at: Utc::now(),
        };
        for line in new.medicines {
            tables.protocol_medicines.push(ProtocolMedicine {
                id: Uuid::new_v4(),
                protocol_id: protocol.id,
                medicine_id: line.medicine_id,
                dosage: line.dosage,
                frequency: line.frequency,
                duration_value: line.duration_value,
                duration_unit: line.duration_unit,
                notes: line.notes,
            });
        }
        tables.protocols.push(protocol.clone());
        tables.protocol_with_medicines(&protocol)
    }

    async fn find_protocol(&self, id: Uuid) -> Result<Option<ProtocolWithMedicines>> {
        let tables = self.lock();
        tables
            .protocols
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.protocol_with_medicines(p))
            .transpose()
    }

    async fn list_protocols(&self) -> Result<Vec<TreatmentProtocol>> {
        let mut protocols = self.lock().protocols.clone();
        protocols.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(protocols)
    }

    async fn create_medicine(&self, new: NewMedicine) -> Result<Medicine> {
        let mut tables = self.lock();
        if tables.medicines.iter().any(|m| m.name == new.name) {
            return Err(Error::Conflict(format!("Medicine '{}' already exists", new.name)));
        }
        let medicine = Medicine {
            id: Uuid::new_v4(),
            name: new.name,
            strength: new.strength,
            unit: new.unit,
            unit_price: new.unit_price,
            created_at: Utc::now(),
        };
        tables.medicines.push(medicine.clone());
        Ok(medicine)
    }

    async fn list_medicines(&self) -> Result<Vec<Medicine>> {
        let mut medicines = self.lock().medicines.clone();
        medicines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(medicines)
    }

    async fn find_medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>> {
        Ok(self
            .lock()
            .medicines
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DoctorRepository for InMemoryStore {
    async fn create(&self, new: NewDoctor) -> Result<Doctor> {
        let mut tables = self.lock();
        if tables.doctors.iter().any(|d| d.email == new.email) {
            return Err(Error::Conflict(format!("Email '{}' already in use", new.email)));
        }
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            full_name: new.full_name,
            email: new.email,
            specialization: new.specialization,
            qualification: new.qualification,
            experience_years: new.experience_years,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.lock().doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        Ok(self
            .lock()
            .doctors
            .iter()
            .find(|d| d.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Doctor>> {
        let mut doctors: Vec<_> = self
            .lock()
            .doctors
            .iter()
            .filter(|d| !active_only || d.is_active)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn update(&self, doctor: &Doctor) -> Result<Doctor> {
        let mut tables = self.lock();
        if tables
            .doctors
            .iter()
            .any(|d| d.id != doctor.id && d.email == doctor.email)
        {
            return Err(Error::Conflict(format!("Email '{}' already in use", doctor.email)));
        }
        let slot = tables
            .doctors
            .iter_mut()
            .find(|d| d.id == doctor.id)
            .ok_or_else(|| Error::not_found("Doctor", doctor.id))?;
        let mut updated = doctor.clone();
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.doctors.len();
        tables.doctors.retain(|d| d.id != id);
        let removed = tables.doctors.len() != before;
        if removed {
            // ON DELETE CASCADE
            tables.schedules.retain(|s| s.doctor_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<DoctorSchedule>> {
        let mut rows: Vec<_> = self
            .lock()
            .schedules
            .iter()
            .filter(|s| s.date >= from && s.date <= to)
            .filter(|s| doctor_id.map_or(true, |id| s.doctor_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(shift_rank(a.shift).cmp(&shift_rank(b.shift)))
                .then(a.doctor_id.cmp(&b.doctor_id))
        });
        Ok(rows)
    }

    async fn replace_working_rows(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        rows: Vec<NewSchedule>,
    ) -> Result<Vec<DoctorSchedule>> {
        let mut tables = self.lock();

        let kept: Vec<DoctorSchedule> = tables
            .schedules
            .iter()
            .filter(|s| s.is_off || s.date < from || s.date > to)
            .cloned()
            .collect();
        for (i, row) in rows.iter().enumerate() {
            let taken = kept
                .iter()
                .any(|s| s.doctor_id == row.doctor_id && s.date == row.date && s.shift == row.shift)
                || rows[..i]
                    .iter()
                    .any(|r| r.doctor_id == row.doctor_id && r.date == row.date && r.shift == row.shift);
            if taken {
                return Err(Error::Conflict(format!(
                    "Doctor {} already has a {} entry on {}",
                    row.doctor_id, row.shift, row.date
                )));
            }
        }

        let now = Utc::now();
        let inserted: Vec<DoctorSchedule> = rows
            .into_iter()
            .map(|row| DoctorSchedule {
                id: Uuid::new_v4(),
                doctor_id: row.doctor_id,
                date: row.date,
                shift: row.shift,
                is_off: row.is_off,
                created_at: now,
            })
            .collect();
        tables.schedules = kept;
        tables.schedules.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn mark_off(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        shift: Shift,
    ) -> Result<DoctorSchedule> {
        let mut tables = self.lock();
        if let Some(existing) = tables
            .schedules
            .iter_mut()
            .find(|s| s.doctor_id == doctor_id && s.date == date && s.shift == shift)
        {
            existing.is_off = true;
            return Ok(existing.clone());
        }
        let row = DoctorSchedule {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            shift,
            is_off: true,
            created_at: Utc::now(),
        };
        tables.schedules.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.schedules.len();
        tables.schedules.retain(|s| s.id != id);
        Ok(tables.schedules.len() != before)
    }
}

#[async_trait]
impl MeetingRepository for InMemoryStore {
    async fn create(&self, new: NewMeetingRecord) -> Result<MeetingRecord> {
        let mut tables = self.lock();
        let now = Utc::now();
        let record = MeetingRecord {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            meeting_link: new.meeting_link,
            start_time: new.start_time,
            end_time: new.end_time,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        tables.meetings.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetingRecord>> {
        Ok(self.lock().meetings.iter().find(|m| m.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &MeetingFilter,
        page: PageRequest,
    ) -> Result<(Vec<MeetingRecord>, i64)> {
        let mut matching: Vec<_> = self
            .lock()
            .meetings
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        let total = matching.len() as i64;
        Ok((page.apply(&matching), total))
    }

    async fn update(&self, record: &MeetingRecord) -> Result<MeetingRecord> {
        let mut tables = self.lock();
        let slot = tables
            .meetings
            .iter_mut()
            .find(|m| m.id == record.id)
            .ok_or_else(|| Error::not_found("Meeting record", record.id))?;
        let mut updated = record.clone();
        updated.patient_id = slot.patient_id;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.meetings.len();
        tables.meetings.retain(|m| m.id != id);
        Ok(tables.meetings.len() != before)
    }
}

#[async_trait]
impl BlogRepository for InMemoryStore {
    async fn create(&self, new: NewBlog) -> Result<Blog> {
        let mut tables = self.lock();
        if tables.blogs.iter().any(|b| b.slug == new.slug) {
            return Err(Error::Conflict(format!("Slug '{}' already in use", new.slug)));
        }
        let now = Utc::now();
        let blog = Blog {
            id: Uuid::new_v4(),
            title: new.title,
            slug: new.slug,
            content: new.content,
            author_id: new.author_id,
            category: new.category,
            image_url: new.image_url,
            status: new.status,
            published_at: new.published_at,
            created_at: now,
            updated_at: now,
        };
        tables.blogs.push(blog.clone());
        Ok(blog)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>> {
        Ok(self.lock().blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Blog>> {
        Ok(self.lock().blogs.iter().find(|b| b.slug == slug).cloned())
    }

    async fn list(&self, filter: &BlogFilter, page: PageRequest) -> Result<(Vec<Blog>, i64)> {
        let mut matching: Vec<_> = self
            .lock()
            .blogs
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            let a_at = a.published_at.unwrap_or(a.created_at);
            let b_at = b.published_at.unwrap_or(b.created_at);
            b_at.cmp(&a_at).then(a.id.cmp(&b.id))
        });
        let total = matching.len() as i64;
        Ok((page.apply(&matching), total))
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        let mut tables = self.lock();
        if tables
            .blogs
            .iter()
            .any(|b| b.id != blog.id && b.slug == blog.slug)
        {
            return Err(Error::Conflict(format!("Slug '{}' already in use", blog.slug)));
        }
        let slot = tables
            .blogs
            .iter_mut()
            .find(|b| b.id == blog.id)
            .ok_or_else(|| Error::not_found("Blog", blog.id))?;
        let mut updated = blog.clone();
        updated.author_id = slot.author_id;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.blogs.len();
        tables.blogs.retain(|b| b.id != id);
        Ok(tables.blogs.len() != before)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_order(&self, new: NewOrder, transaction_code: &str) -> Result<(Order, Payment)> {
        let mut tables = self.lock();
        if tables
            .payments
            .iter()
            .any(|p| p.transaction_code == transaction_code)
        {
            return Err(Error::Conflict(format!(
                "Transaction code '{transaction_code}' in use"
            )));
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            kind: new.kind,
            reference_id: new.reference_id,
            amount: new.amount,
            status: OrderStatus::Pending,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            transaction_code: transaction_code.to_string(),
            amount: new.amount,
            status: PaymentStatus::Pending,
            gateway_transaction_id: None,
            amount_received: None,
            failure_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(order.clone());
        tables.payments.push(payment.clone());
        Ok((order, payment))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_payment_by_code(&self, transaction_code: &str) -> Result<Option<Payment>> {
        Ok(self
            .lock()
            .payments
            .iter()
            .find(|p| p.transaction_code.eq_ignore_ascii_case(transaction_code))
            .cloned())
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let mut payments: Vec<_> = self
            .lock()
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }

    async fn settle(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
    ) -> Result<Option<(Payment, Order)>> {
        let mut tables = self.lock();
        let (order_id, status) = tables
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .map(|p| (p.order_id, p.status))
            .ok_or_else(|| Error::not_found("Payment", payment_id))?;
        if status == PaymentStatus::Paid {
            return Ok(None);
        }
        if !tables.orders.iter().any(|o| o.id == order_id) {
            return Err(Error::not_found("Order", order_id));
        }

        let now = Utc::now();
        let mut settled_payment = None;
        if let Some(payment) = tables.payments.iter_mut().find(|p| p.id == payment_id) {
            payment.status = PaymentStatus::Paid;
            payment.gateway_transaction_id = Some(receipt.gateway_transaction_id);
            payment.amount_received = Some(receipt.amount_received);
            payment.paid_at = Some(receipt.received_at);
            payment.failure_reason = None;
            payment.updated_at = now;
            settled_payment = Some(payment.clone());
        }
        let mut settled_order = None;
        if let Some(order) = tables.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = OrderStatus::Paid;
            order.updated_at = now;
            settled_order = Some(order.clone());
        }

        match (settled_payment, settled_order) {
            (Some(payment), Some(order)) => Ok(Some((payment, order))),
            _ => Err(Error::Internal("Payment settlement lost its rows".to_string())),
        }
    }

    async fn mark_failed(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
        reason: &str,
    ) -> Result<Option<Payment>> {
        let mut tables = self.lock();
        let payment = tables
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| Error::not_found("Payment", payment_id))?;
        if payment.status == PaymentStatus::Paid {
            return Ok(None);
        }
        payment.status = PaymentStatus::Failed;
        payment.gateway_transaction_id = Some(receipt.gateway_transaction_id);
        payment.amount_received = Some(receipt.amount_received);
        payment.failure_reason = Some(reason.to_string());
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderKind, ProtocolCategory};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn doctor(store: &InMemoryStore, email: &str) -> Doctor {
        DoctorRepository::create(
            store,
            NewDoctor {
                user_id: None,
                full_name: "Dr. Test".to_string(),
                email: email.to_string(),
                specialization: "Infectious disease".to_string(),
                qualification: None,
                experience_years: 5,
            },
        )
        .await
        .unwrap()
    }

    fn new_treatment(patient_id: Uuid, doctor_id: Uuid, start: NaiveDate) -> NewTreatment {
        NewTreatment {
            patient_id,
            doctor_id,
            protocol_id: None,
            custom_medications: None,
            start_date: start,
            end_date: None,
            total_cost: Decimal::ZERO,
            notes: None,
        }
    }

    #[tokio::test]
    async fn replacing_closes_open_treatments_atomically() {
        let store = InMemoryStore::new();
        let doc = doctor(&store, "a@clinic.test").await;
        let patient = Uuid::new_v4();

        let first = TreatmentRepository::create(&store, new_treatment(patient, doc.id, date(2024, 1, 1)), date(2024, 1, 1))
            .await
            .unwrap();
        let (second, closed) = store
            .create_replacing_open(
                new_treatment(patient, doc.id, date(2024, 3, 1)),
                date(2024, 3, 1),
                date(2024, 2, 29),
            )
            .await
            .unwrap();

        assert_eq!(closed, vec![first.id]);
        let first = TreatmentRepository::find_by_id(&store, first.id).await.unwrap().unwrap();
        assert_eq!(first.status, TreatmentStatus::Completed);
        assert_eq!(first.end_date, Some(date(2024, 2, 29)));
        let open = store
            .find_open_for_patient(patient, date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);
    }

    #[tokio::test]
    async fn open_treatment_blocks_insert_and_reopening() {
        let store = InMemoryStore::new();
        let doc = doctor(&store, "c@clinic.test").await;
        let patient = Uuid::new_v4();
        let today = date(2024, 3, 1);

        let mut ended = new_treatment(patient, doc.id, date(2024, 1, 1));
        ended.end_date = Some(date(2024, 1, 31));
        let ended = TreatmentRepository::create(&store, ended, today).await.unwrap();
        let current = TreatmentRepository::create(&store, new_treatment(patient, doc.id, date(2024, 2, 15)), today)
            .await
            .unwrap();

        let err = TreatmentRepository::create(&store, new_treatment(patient, doc.id, date(2024, 3, 1)), today)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let mut reopened = ended.clone();
        reopened.end_date = None;
        let err = TreatmentRepository::update(&store, &reopened, today).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // the open row itself can still be edited
        let mut edited = current.clone();
        edited.notes = Some("dose reviewed".to_string());
        let edited = TreatmentRepository::update(&store, &edited, today).await.unwrap();
        assert_eq!(edited.notes.as_deref(), Some("dose reviewed"));
    }

    #[tokio::test]
    async fn replacing_with_unknown_doctor_changes_nothing() {
        let store = InMemoryStore::new();
        let doc = doctor(&store, "b@clinic.test").await;
        let patient = Uuid::new_v4();
        TreatmentRepository::create(&store, new_treatment(patient, doc.id, date(2024, 1, 1)), date(2024, 1, 1))
            .await
            .unwrap();

        let err = store
            .create_replacing_open(
                new_treatment(patient, Uuid::new_v4(), date(2024, 3, 1)),
                date(2024, 3, 1),
                date(2024, 2, 29),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let open = store
            .find_open_for_patient(patient, date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        doctor(&store, "same@clinic.test").await;
        let err = DoctorRepository::create(
            &store,
            NewDoctor {
                user_id: None,
                full_name: "Other".to_string(),
                email: "same@clinic.test".to_string(),
                specialization: "GP".to_string(),
                qualification: None,
                experience_years: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn protocol_requires_known_medicines() {
        let store = InMemoryStore::new();
        let err = store
            .create_protocol(NewProtocol {
                name: "TLD".to_string(),
                description: None,
                category: ProtocolCategory::FirstLine,
                duration_days: Some(30),
                medicines: vec![crate::models::protocol::NewProtocolMedicine {
                    medicine_id: Uuid::new_v4(),
                    dosage: "1 tablet".to_string(),
                    frequency: "once daily".to_string(),
                    duration_value: None,
                    duration_unit: None,
                    notes: None,
                }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.list_protocols().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replacing_week_keeps_leave_markers() {
        let store = InMemoryStore::new();
        let doc = doctor(&store, "c@clinic.test").await;
        let monday = date(2024, 6, 3);
        store.mark_off(doc.id, monday, Shift::Morning).await.unwrap();

        let inserted = store
            .replace_working_rows(
                monday,
                date(2024, 6, 9),
                vec![NewSchedule {
                    doctor_id: doc.id,
                    date: monday,
                    shift: Shift::Afternoon,
                    is_off: false,
                }],
            )
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);

        let rows = store.list_between(monday, monday, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_off && rows[0].shift == Shift::Morning);

        let clash = store
            .replace_working_rows(
                monday,
                date(2024, 6, 9),
                vec![NewSchedule {
                    doctor_id: doc.id,
                    date: monday,
                    shift: Shift::Morning,
                    is_off: false,
                }],
            )
            .await;
        assert!(matches!(clash, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn settle_updates_payment_and_order() {
        let store = InMemoryStore::new();
        let (order, payment) = store
            .create_order(
                NewOrder {
                    patient_id: Uuid::new_v4(),
                    kind: OrderKind::Appointment,
                    reference_id: Uuid::new_v4(),
                    amount: Decimal::new(150_000, 0),
                    description: None,
                },
                "HCABCDEFGH",
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let found = store.find_payment_by_code("hcabcdefgh").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(payment.id));

        let receipt = |id: &str, amount: i64| GatewayReceipt {
            gateway_transaction_id: id.to_string(),
            amount_received: Decimal::new(amount, 0),
            received_at: Utc::now(),
        };
        let (paid, order) = store
            .settle(payment.id, receipt("gw-1", 150_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Paid);

        // a late notification cannot undo the settlement
        let failed = store
            .mark_failed(payment.id, receipt("gw-2", 1_000), "amount_mismatch")
            .await
            .unwrap();
        assert_eq!(failed, None);
        assert_eq!(store.settle(payment.id, receipt("gw-3", 150_000)).await.unwrap(), None);

        let stored = store.find_payment_by_code("HCABCDEFGH").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
        assert_eq!(stored.gateway_transaction_id.as_deref(), Some("gw-1"));
    }
}
