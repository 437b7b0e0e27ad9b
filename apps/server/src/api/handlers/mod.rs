pub mod content;
pub mod doctors;
pub mod health;
pub mod payments;
pub mod protocols;
pub mod reports;
pub mod treatments;
