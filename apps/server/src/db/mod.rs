//! Database layer
//!
//! Repository traits live in [`traits`]; [`PostgresStore`] implements them on
//! top of sqlx and [`InMemoryStore`] keeps everything in process.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{
    BlogRepository, DoctorRepository, MeetingRepository, PaymentRepository, ProtocolRepository,
    ScheduleRepository, TreatmentRepository,
};

use crate::Result;
use std::sync::Arc;

/// One handle per repository, all backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub treatments: Arc<dyn TreatmentRepository>,
    pub protocols: Arc<dyn ProtocolRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub meetings: Arc<dyn MeetingRepository>,
    pub blogs: Arc<dyn BlogRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Postgres(PostgresStore),
    Memory,
}

impl Repositories {
    pub fn postgres(store: PostgresStore) -> Self {
        let shared = Arc::new(store.clone());
        Self {
            treatments: shared.clone(),
            protocols: shared.clone(),
            doctors: shared.clone(),
            schedules: shared.clone(),
            meetings: shared.clone(),
            blogs: shared.clone(),
            payments: shared,
            backend: Backend::Postgres(store),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            treatments: store.clone(),
            protocols: store.clone(),
            doctors: store.clone(),
            schedules: store.clone(),
            meetings: store.clone(),
            blogs: store.clone(),
            payments: store,
            backend: Backend::Memory,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Memory => "memory",
        }
    }

    /// Readiness probe; the in-process store is always reachable.
    pub async fn ping(&self) -> Result<()> {
        match &self.backend {
            Backend::Postgres(store) => store.ping().await,
            Backend::Memory => Ok(()),
        }
    }
}
