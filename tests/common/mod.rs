#![allow(dead_code)]

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use loanlink::application::reconciler::CheckoutSettings;
use loanlink::domain::ports::{Stores, UserStore};
use loanlink::domain::user::{Role, User};
use loanlink::infrastructure::in_memory::{InMemoryCheckoutGateway, in_memory_stores};
use loanlink::infrastructure::jwt::{Claims, JwtVerifier};
use loanlink::interfaces::http::{AppState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-secret";

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        currency: "usd".to_string(),
        success_url: "http://localhost:5173/payment-success?session_id={CHECKOUT_SESSION_ID}"
            .to_string(),
        cancel_url: "http://localhost:5173/payment-cancelled".to_string(),
        gateway_timeout: Duration::from_secs(5),
    }
}

pub fn token(email: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            email: email.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// The real router over in-memory adapters, served on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub stores: Stores,
    pub gateway: InMemoryCheckoutGateway,
    pub client: reqwest::Client,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let stores = in_memory_stores();
        let gateway = InMemoryCheckoutGateway::new();
        let state = AppState::new(
            stores.clone(),
            Arc::new(gateway.clone()),
            Arc::new(JwtVerifier::new(SECRET)),
            settings(),
        );
        let app = router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("local_addr should succeed");

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            stores,
            gateway,
            client: reqwest::Client::new(),
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seeds a user with `role` straight into the store.
    pub async fn seed_user(&self, email: &str, role: Role) {
        let user = self
            .stores
            .users
            .upsert(User::new(email, "Seeded"))
            .await
            .unwrap();
        if user.role != role {
            self.stores.users.set_role(email, role).await.unwrap();
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}
