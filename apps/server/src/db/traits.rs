//! Repository traits, one per aggregate
//!
//! Implementations exist for Postgres ([`super::PostgresStore`]) and for the
//! in-process [`super::InMemoryStore`]. Operations that touch several rows are
//! atomic in both.

use crate::{
    models::{
        blog::{BlogFilter, NewBlog},
        doctor::{NewDoctor, NewSchedule},
        meeting::{MeetingFilter, NewMeetingRecord},
        payment::{GatewayReceipt, NewOrder},
        protocol::{NewMedicine, NewProtocol},
        treatment::{NewTreatment, TreatmentFilter},
        Blog, Doctor, DoctorSchedule, MeetingRecord, Medicine, Order, PageRequest,
        PatientTreatment, Payment, ProtocolWithMedicines, Shift, TreatmentProtocol,
        TreatmentStatus,
    },
    Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

#[async_trait]
pub trait TreatmentRepository: Send + Sync {
    /// Insert a treatment. Fails with `Conflict` when the patient already has
    /// an open treatment as of `today`; the check and the insert are atomic.
    async fn create(&self, new: NewTreatment, today: NaiveDate) -> Result<PatientTreatment>;

    /// Close every open treatment of the patient (status `completed`, `end_date = close_on`)
    /// and insert the new one in a single transaction. Returns the new row and the ids closed.
    async fn create_replacing_open(
        &self,
        new: NewTreatment,
        today: NaiveDate,
        close_on: NaiveDate,
    ) -> Result<(PatientTreatment, Vec<Uuid>)>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PatientTreatment>>;

    /// Open treatments of a patient as of `today`.
    async fn find_open_for_patient(
        &self,
        patient_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PatientTreatment>>;

    /// All treatments of a patient ordered by start date ascending.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<PatientTreatment>>;

    async fn search(
        &self,
        filter: &TreatmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<PatientTreatment>, i64)>;

    /// Every treatment matching the filter, unpaginated (reporting).
    async fn list_all(&self, filter: &TreatmentFilter) -> Result<Vec<PatientTreatment>>;

    /// Persist a changed treatment. When the row is open as of `today`, no other
    /// open treatment of the patient may exist (`Conflict`).
    async fn update(&self, treatment: &PatientTreatment, today: NaiveDate) -> Result<PatientTreatment>;

    async fn end(
        &self,
        id: Uuid,
        end_date: NaiveDate,
        status: TreatmentStatus,
    ) -> Result<PatientTreatment>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ProtocolRepository: Send + Sync {
    async fn create_protocol(&self, new: NewProtocol) -> Result<ProtocolWithMedicines>;

    async fn find_protocol(&self, id: Uuid) -> Result<Option<ProtocolWithMedicines>>;

    async fn list_protocols(&self) -> Result<Vec<TreatmentProtocol>>;

    async fn create_medicine(&self, new: NewMedicine) -> Result<Medicine>;

    async fn list_medicines(&self) -> Result<Vec<Medicine>>;

    async fn find_medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn create(&self, new: NewDoctor) -> Result<Doctor>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>>;

    async fn list(&self, active_only: bool) -> Result<Vec<Doctor>>;

    async fn update(&self, doctor: &Doctor) -> Result<Doctor>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<DoctorSchedule>>;

    /// Delete working (non-leave) rows in `[from, to]` and insert `rows` in one transaction.
    async fn replace_working_rows(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        rows: Vec<NewSchedule>,
    ) -> Result<Vec<DoctorSchedule>>;

    /// Replace whatever occupies the slot with a leave marker.
    async fn mark_off(&self, doctor_id: Uuid, date: NaiveDate, shift: Shift)
        -> Result<DoctorSchedule>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn create(&self, new: NewMeetingRecord) -> Result<MeetingRecord>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetingRecord>>;

    async fn list(
        &self,
        filter: &MeetingFilter,
        page: PageRequest,
    ) -> Result<(Vec<MeetingRecord>, i64)>;

    async fn update(&self, record: &MeetingRecord) -> Result<MeetingRecord>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, new: NewBlog) -> Result<Blog>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Blog>>;

    async fn list(&self, filter: &BlogFilter, page: PageRequest) -> Result<(Vec<Blog>, i64)>;

    async fn update(&self, blog: &Blog) -> Result<Blog>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert an order and its pending payment together.
    async fn create_order(&self, new: NewOrder, transaction_code: &str) -> Result<(Order, Payment)>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn find_payment_by_code(&self, transaction_code: &str) -> Result<Option<Payment>>;

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>>;

    /// Mark the payment and its order as paid in one transaction.
    /// `None` when the payment was already paid; nothing is written then.
    async fn settle(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
    ) -> Result<Option<(Payment, Order)>>;

    /// Mark an unpaid payment as failed. `None` when it was already paid.
    async fn mark_failed(
        &self,
        payment_id: Uuid,
        receipt: GatewayReceipt,
        reason: &str,
    ) -> Result<Option<Payment>>;
}
