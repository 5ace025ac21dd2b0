//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.
//! Time is driven by a [`ManualClock`] so expiry, refill and sweep boundaries
//! can be hit exactly.

use common::clock::ManualClock;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use waveguide_gateway::audit::InMemoryAuditLog;
use waveguide_gateway::config::Config;
use waveguide_gateway::directory::InMemoryUserDirectory;
use waveguide_gateway::routes::{self, AppState};

/// Signing secret used by every test server (64 bytes).
pub const TEST_JWT_SECRET: &str =
    "waveguide-test-signing-secret-0123456789abcdef0123456789abcdef!!";

/// A registered user and the token issued at registration.
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub token: String,
}

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestGatewayServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(format!("{}/health", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    state: Arc<AppState>,
    clock: ManualClock,
    audit: Arc<InMemoryAuditLog>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a test server with default test configuration.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use bcrypt cost 4 and a generous rate limit
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn a test server, overriding configuration variables.
    ///
    /// # Arguments
    /// * `overrides` - Environment-style variables replacing the test defaults
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("BCRYPT_COST".to_string(), "4".to_string()),
            ("RATE_LIMIT_REQUESTS_PER_HOUR".to_string(), "1000".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let clock = ManualClock::starting_now();
        let audit = Arc::new(InMemoryAuditLog::new());
        let state = Arc::new(AppState::new(
            config.clone(),
            Arc::new(clock.clone()),
            Arc::new(InMemoryUserDirectory::new()),
            audit.clone(),
        ));

        // Recorder is not installed globally so servers can coexist in one process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // ConnectInfo supplies the peer address used for rate limiting
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            state,
            clock,
            audit,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared state of the running server (stores, codec, directory).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The clock every component of this server reads.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// The audit log this server records user actions into.
    pub fn audit_log(&self) -> &InMemoryAuditLog {
        &self.audit
    }

    /// Move the server's clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    /// Register a user through the HTTP API and return the issued token.
    ///
    /// Panics if registration does not return 201.
    pub async fn register(
        &self,
        client: &reqwest::Client,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<TestAccount, anyhow::Error> {
        let response = client
            .post(format!("{}/api/v1/auth/register", self.url()))
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        assert_eq!(response.status(), 201, "registration should succeed");
        let body: serde_json::Value = response.json().await?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("registration response has no token"))?
            .to_string();

        Ok(TestAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            token,
        })
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test releases its port promptly
        self._handle.abort();
    }
}
