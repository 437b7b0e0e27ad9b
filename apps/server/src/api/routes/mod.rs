use crate::api::handlers::{content, doctors, payments, protocols, reports, treatments};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Everything mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(treatment_routes())
        .merge(clinic_routes())
        .merge(content_routes())
        .merge(payment_routes())
}

fn treatment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/treatments",
            get(treatments::search_treatments).post(treatments::create_treatment),
        )
        .route("/treatments/preview-cost", post(treatments::preview_cost))
        .route("/treatments/validate", post(treatments::validate_regimen))
        .route(
            "/treatments/:id",
            get(treatments::get_treatment)
                .patch(treatments::update_treatment)
                .delete(treatments::delete_treatment),
        )
        .route("/treatments/:id/end", post(treatments::end_treatment))
        .route(
            "/treatments/:id/recalculate-cost",
            post(treatments::recalculate_cost),
        )
        .route("/treatments/:id/validate", post(treatments::validate_treatment))
        .route(
            "/patients/:patient_id/treatments",
            get(treatments::patient_history),
        )
        .route(
            "/patients/:patient_id/treatments/active",
            get(treatments::active_treatment),
        )
        // Protocol catalogue
        .route(
            "/protocols",
            get(protocols::list_protocols).post(protocols::create_protocol),
        )
        .route("/protocols/:id", get(protocols::get_protocol))
        .route(
            "/medicines",
            get(protocols::list_medicines).post(protocols::create_medicine),
        )
        // Reporting
        .route("/reports/treatments", get(reports::treatment_stats))
        .route("/reports/doctor-workload", get(reports::doctor_workload))
}

fn clinic_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/doctors",
            get(doctors::list_doctors).post(doctors::create_doctor),
        )
        .route(
            "/doctors/:id",
            get(doctors::get_doctor)
                .patch(doctors::update_doctor)
                .delete(doctors::delete_doctor),
        )
        .route("/doctors/:id/deactivate", post(doctors::deactivate_doctor))
        .route("/schedules", get(doctors::list_schedules))
        .route("/schedules/generate", post(doctors::generate_week))
        .route("/schedules/leave", post(doctors::mark_off))
        .route(
            "/schedules/:id",
            axum::routing::delete(doctors::delete_schedule),
        )
}

fn content_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/meetings",
            get(content::list_meetings).post(content::create_meeting),
        )
        .route(
            "/meetings/:id",
            get(content::get_meeting)
                .patch(content::update_meeting)
                .delete(content::delete_meeting),
        )
        .route("/blogs", get(content::list_blogs).post(content::create_blog))
        .route("/blogs/slug/:slug", get(content::get_blog_by_slug))
        .route(
            "/blogs/:id",
            get(content::get_blog)
                .patch(content::update_blog)
                .delete(content::delete_blog),
        )
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(payments::create_order))
        .route("/orders/:id", get(payments::get_order))
        .route("/payments/:code", get(payments::get_payment_by_code))
        .route("/webhooks/payments", post(payments::payment_webhook))
}
