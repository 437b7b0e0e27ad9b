//! Domain models shared by the repository, service and API layers

/// Declares a fieldless enum stored as lowercase text in the database and on the wire.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::Error::Validation(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

pub mod blog;
pub mod clinical;
pub mod doctor;
pub mod meeting;
pub mod pagination;
pub mod payment;
pub mod protocol;
pub mod treatment;

pub use blog::{Blog, BlogStatus};
pub use clinical::ClinicalContext;
pub use doctor::{Doctor, DoctorSchedule, Shift};
pub use meeting::MeetingRecord;
pub use pagination::{PageRequest, Paginated};
pub use payment::{Order, OrderKind, OrderStatus, Payment, PaymentStatus};
pub use protocol::{Medicine, ProtocolCategory, ProtocolMedicine, ProtocolWithMedicines, TreatmentProtocol};
pub use treatment::{CustomMedication, DurationUnit, PatientTreatment, TreatmentStatus};
