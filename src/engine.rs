//! Engine facade
//!
//! One [`Engine`] drives one audit run: it owns the session and the
//! phase components, and exposes the phases in the order a run uses
//! them. Phases that change session state take `&mut self`; the probe
//! fan-out takes `&self` and therefore cannot overlap with them.

use std::sync::Arc;

use crate::app::Config;
use crate::attack::{AttackOrchestrator, AttemptLog, NewAccount, PrivilegedAction};
use crate::error::{HttpError, InputError};
use crate::forge::{Token, TokenForge};
use crate::http::{SessionClient, Transport};
use crate::hunter::CredentialHunter;
use crate::prober::{EndpointProber, ProbeResult};
use crate::session::{ArtifactInjector, AuthMode, AuthResult, ParsedCookies};
use crate::target::TargetConfig;

pub struct Engine {
    client: SessionClient,
    hunter: CredentialHunter,
    prober: EndpointProber,
    orchestrator: AttackOrchestrator,
}

impl Engine {
    /// Open a session against `target` over the reqwest transport
    pub fn open(target: TargetConfig, config: &Config) -> Result<Self, HttpError> {
        let target = apply_identity(target, config);
        let client = SessionClient::open(target, &config.session)?;
        Ok(Self::assemble(client, config))
    }

    /// Open a session over a caller-provided transport
    pub fn with_transport(target: TargetConfig, config: &Config, transport: Arc<dyn Transport>) -> Self {
        let target = apply_identity(target, config);
        let client = SessionClient::with_transport(target, &config.session, transport);
        Self::assemble(client, config)
    }

    fn assemble(client: SessionClient, config: &Config) -> Self {
        let markers = config.markers.for_variant(client.target().variant()).clone();
        Self {
            hunter: CredentialHunter::new(config.retry.clone()),
            prober: EndpointProber::new(markers, config.prober.clone()),
            orchestrator: AttackOrchestrator::new(TokenForge::new(config.forge.clone()), config.attack.clone()),
            client,
        }
    }

    /// Account the cookie-mode action creates, for variants that have one
    pub fn with_account(mut self, account: &NewAccount) -> Self {
        let action = PrivilegedAction::for_variant(self.client.target().variant(), account);
        if action.is_none() {
            tracing::debug!(variant = %self.client.target().variant(), "No privileged action for variant");
        }
        self.orchestrator = self.orchestrator.with_action(action);
        self
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn mode(&self) -> AuthMode {
        self.client.state().mode()
    }

    /// Load a raw cookie string into the session
    pub fn inject(&mut self, raw: &str) -> Result<ParsedCookies, InputError> {
        ArtifactInjector::inject_cookies(&mut self.client, raw)
    }

    /// Load a captured bearer token into the session
    pub fn inject_token(&mut self, raw: &str) -> Result<Token, InputError> {
        ArtifactInjector::inject_token(&mut self.client, raw)
    }

    /// Log in with `credentials` and adopt whatever artifact is issued
    pub async fn hunt(&mut self, login_path: &str, credentials: &[(String, String)]) -> AuthResult {
        self.hunter.hunt(&mut self.client, login_path, credentials).await
    }

    pub async fn probe(&self, paths: &[String]) -> Vec<ProbeResult> {
        self.prober.probe(&self.client, paths).await
    }

    pub async fn attack(&mut self, targets: &[ProbeResult], mode: AuthMode) -> AttemptLog {
        self.orchestrator.execute(&mut self.client, targets, mode).await
    }

    /// End the run and release the session
    pub fn close(self) {
        self.client.close();
    }
}

fn apply_identity(target: TargetConfig, config: &Config) -> TargetConfig {
    target
        .with_user_agent(&config.session.user_agent)
        .with_timeout(config.session.timeout())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::AttemptOutcome;
    use crate::http::transport::stub::{reply, StubTransport};
    use crate::prober::ProbeClassification;
    use crate::target::TargetVariant;

    const DASHBOARD: &str = r#"<html><title>Dashboard</title><div id="wp-admin-bar">Howdy</div></html>"#;

    fn engine(stub: Arc<StubTransport>, variant: TargetVariant) -> Engine {
        let target = TargetConfig::new("http://blog.test/", variant).unwrap();
        Engine::with_transport(target, &Config::default(), stub)
    }

    #[tokio::test]
    async fn test_cookie_run_end_to_end() {
        let stub = Arc::new(StubTransport::new(|req| {
            let path = req.url.path().to_string();
            match (req.method, path.as_str()) {
                (_, "/wp-admin/") => Ok(reply(req, 200, DASHBOARD)),
                (crate::http::Method::Get, "/wp-admin/user-new.php") => Ok(reply(
                    req,
                    200,
                    r#"<input type="hidden" name="_wpnonce_create-user" value="n0nce" />"#,
                )),
                (crate::http::Method::Post, "/wp-admin/user-new.php") => {
                    let mut response = reply(req, 200, "ok");
                    response.final_url = "http://blog.test/wp-admin/users.php?update=add".to_string();
                    Ok(response)
                }
                _ => Ok(reply(req, 404, "")),
            }
        }));
        let mut engine = engine(stub.clone(), TargetVariant::WordPress)
            .with_account(&NewAccount::new("ghost", "ghost@blog.test", "S3cret!"));

        engine.inject("wordpress_logged_in=abc; wp-settings-1=x").unwrap();
        assert_eq!(engine.mode(), AuthMode::Cookie);
        assert_eq!(engine.client().cookies().get("wordpress_logged_in"), Some("abc"));

        let results = engine.probe(&["wp-admin/".to_string(), "wp-admin/profile.php".to_string()]).await;
        let accessible: Vec<_> = results.iter().filter(|r| r.is_accessible()).collect();
        assert_eq!(accessible.len(), 1);

        let mode = engine.mode();
        let log = engine.attack(&results, mode).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.attempts()[0].outcome(), &AttemptOutcome::ActionSucceeded);

        let posted = stub
            .requests()
            .into_iter()
            .find(|r| r.method == crate::http::Method::Post)
            .unwrap();
        assert!(posted.body.unwrap().contains("_wpnonce_create-user=n0nce"));
        engine.close();
    }

    #[tokio::test]
    async fn test_malformed_cookie_leaves_mode_unchanged() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, ""))));
        let mut engine = engine(stub, TargetVariant::Generic);

        assert!(engine.inject("a=1; broken").is_err());
        assert_eq!(engine.mode(), AuthMode::None);
    }

    #[tokio::test]
    async fn test_probe_uses_variant_markers() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, "<h1>Página no encontrada</h1>"))));
        let engine = engine(stub, TargetVariant::PrestaShop);

        let results = engine.probe(&["administrador".to_string()]).await;
        assert_eq!(results[0].classification, ProbeClassification::Rejected);
    }

    #[tokio::test]
    async fn test_attack_without_artifact_is_skipped() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, ""))));
        let mut engine = engine(stub.clone(), TargetVariant::Generic);

        let log = engine.attack(&[], AuthMode::None).await;
        assert!(matches!(log.attempts()[0].outcome(), AttemptOutcome::Skipped { .. }));
        assert_eq!(stub.request_count(), 0);
    }
}
