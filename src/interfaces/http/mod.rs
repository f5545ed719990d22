//! REST surface consumed by the LoanLink web front end.

mod applications;
pub mod auth;
pub mod error;
mod loans;
mod payments;
mod users;

use crate::application::access::RoleAuthority;
use crate::application::applications::ApplicationService;
use crate::application::loans::LoanCatalog;
use crate::application::reconciler::{CheckoutSettings, PaymentReconciler};
use crate::domain::ports::{CheckoutGatewayRef, IdentityVerifierRef, Stores};
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<PaymentReconciler>,
    pub loans: LoanCatalog,
    pub applications: ApplicationService,
    pub access: RoleAuthority,
    pub verifier: IdentityVerifierRef,
}

impl AppState {
    pub fn new(
        stores: Stores,
        gateway: CheckoutGatewayRef,
        verifier: IdentityVerifierRef,
        settings: CheckoutSettings,
    ) -> Self {
        let reconciler = PaymentReconciler::new(
            gateway,
            stores.applications.clone(),
            stores.payments.clone(),
            settings,
        );
        Self {
            reconciler: Arc::new(reconciler),
            loans: LoanCatalog::new(stores.loans.clone()),
            applications: ApplicationService::new(stores.applications, stores.loans),
            access: RoleAuthority::new(stores.users),
            verifier,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let managers = Router::new()
        .route("/loans", post(loans::create_loan))
        .route("/applications", get(applications::list_applications))
        .route(
            "/applications/{id}/status",
            patch(applications::decide_application),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_manager));

    let admins = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{email}/role", patch(users::set_user_role))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    let authenticated = Router::new()
        .route("/users", post(users::register_user))
        .route("/users/role", get(users::user_role))
        .route("/applications", post(applications::submit_application))
        .route("/applications/mine", get(applications::my_applications))
        .route(
            "/applications/{id}/cancel",
            patch(applications::cancel_application),
        )
        .route(
            "/create-checkout-session",
            post(payments::create_checkout_session),
        )
        .route("/payment-success", patch(payments::payment_success))
        .route("/payment-info", get(payments::payment_info))
        .route("/payments/mine", get(payments::my_payments))
        .merge(managers)
        .merge(admins)
        .route_layer(from_fn_with_state(state.clone(), auth::authenticate));

    Router::new()
        .route("/", get(root))
        .route("/loans", get(loans::list_loans))
        .route("/loans/home", get(loans::home_loans))
        .route("/loans/{id}", get(loans::get_loan))
        .merge(authenticated)
        .with_state(state)
}

async fn root() -> &'static str {
    "Server is running"
}
