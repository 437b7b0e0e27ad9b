//! Business logic layer
//!
//! Services orchestrate operations by coordinating repositories and
//! applying business rules. Multi-row writes are delegated to repository
//! methods that run in a single transaction.

pub mod blog;
pub mod doctor;
pub mod meeting;
pub mod payment;
pub mod protocol;
pub mod schedule;
pub mod treatment;
pub mod validation;

pub use blog::BlogService;
pub use doctor::DoctorService;
pub use meeting::MeetingService;
pub use payment::PaymentService;
pub use protocol::ProtocolService;
pub use schedule::ScheduleService;
pub use treatment::{TreatmentQueryService, TreatmentService, TreatmentStatsService};
