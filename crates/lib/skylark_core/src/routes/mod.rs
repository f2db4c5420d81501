//! Declarative route access rules, evaluated before navigation.
//!
//! A denied guard never hard-redirects an anonymous user straight away:
//! it first opens the injected login dialog and lets a successful
//! interactive login carry the pending navigation through. Cancelling the
//! dialog, or failing a role requirement, redirects instead.

use async_trait::async_trait;

use crate::session::SessionError;
use crate::session::manager::SessionManager;

/// Destination for denied navigation and for the catch-all route.
pub const HOME: &str = "/";

/// Per-route access requirements.
#[derive(Debug, Clone, Copy)]
pub struct RouteAccess {
    pub require_auth: bool,
    pub require_admin: bool,
    pub require_roles: &'static [&'static str],
    /// Where a denied navigation lands.
    pub redirect_to: &'static str,
}

impl RouteAccess {
    pub const fn public() -> Self {
        Self {
            require_auth: false,
            require_admin: false,
            require_roles: &[],
            redirect_to: HOME,
        }
    }

    pub const fn authenticated() -> Self {
        Self {
            require_auth: true,
            ..Self::public()
        }
    }

    pub const fn admin() -> Self {
        Self {
            require_auth: true,
            require_admin: true,
            ..Self::public()
        }
    }

    pub const fn roles(roles: &'static [&'static str]) -> Self {
        Self {
            require_auth: true,
            require_roles: roles,
            ..Self::public()
        }
    }
}

/// Which login dialog the guard asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginScope {
    General,
    Admin,
}

/// Seam to the interactive login dialog.
///
/// Resolves to `true` when the user completed a login, `false` when they
/// cancelled. The guard re-reads the session afterwards rather than
/// trusting the flag alone.
#[async_trait]
pub trait LoginPrompt: Send + Sync {
    async fn prompt_login(&self, scope: LoginScope) -> Result<bool, SessionError>;
}

/// Result of evaluating a guard for a pending navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(&'static str),
}

/// Evaluate route access against the current session.
///
/// An anonymous user gets one interactive login attempt (admin-scoped when
/// the route requires admin); role and admin checks run after it. An
/// authenticated user failing a requirement is redirected without a
/// prompt, since logging in again would not change their roles.
pub async fn evaluate(
    session: &SessionManager,
    prompt: &dyn LoginPrompt,
    access: &RouteAccess,
) -> GuardOutcome {
    if !access.require_auth {
        return GuardOutcome::Allow;
    }

    if !session.is_authenticated() {
        let scope = if access.require_admin {
            LoginScope::Admin
        } else {
            LoginScope::General
        };
        let logged_in = match prompt.prompt_login(scope).await {
            Ok(logged_in) => logged_in,
            Err(e) => {
                tracing::warn!(error = %e, "login dialog failed during guard evaluation");
                false
            }
        };
        if !logged_in || !session.is_authenticated() {
            tracing::debug!("login cancelled, redirecting");
            return GuardOutcome::Redirect(access.redirect_to);
        }
    }

    if access.require_admin && !session.is_admin() {
        tracing::debug!("admin access required, redirecting");
        return GuardOutcome::Redirect(access.redirect_to);
    }

    if !access.require_roles.is_empty() && !session.has_any_role(access.require_roles) {
        tracing::debug!(roles = ?access.require_roles, "insufficient roles, redirecting");
        return GuardOutcome::Redirect(access.redirect_to);
    }

    GuardOutcome::Allow
}

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

/// One routable path pattern. Segments starting with `:` match any value.
#[derive(Debug, Clone, Copy)]
pub struct RouteDef {
    pub pattern: &'static str,
    pub access: RouteAccess,
}

/// The application's representative route surface. Unknown paths fall
/// through to the catch-all redirect ([`HOME`]).
pub fn route_table() -> &'static [RouteDef] {
    const TABLE: &[RouteDef] = &[
        RouteDef {
            pattern: "/",
            access: RouteAccess::public(),
        },
        RouteDef {
            pattern: "/about",
            access: RouteAccess::public(),
        },
        RouteDef {
            pattern: "/contact",
            access: RouteAccess::public(),
        },
        RouteDef {
            pattern: "/quiz",
            access: RouteAccess::public(),
        },
        RouteDef {
            pattern: "/quiz/:id",
            access: RouteAccess::public(),
        },
        RouteDef {
            pattern: "/quiz/:id/upload",
            access: RouteAccess::authenticated(),
        },
        RouteDef {
            pattern: "/quiz/:id/report",
            access: RouteAccess::authenticated(),
        },
        RouteDef {
            pattern: "/admin/user",
            access: RouteAccess::admin(),
        },
        RouteDef {
            pattern: "/admin/quiz",
            access: RouteAccess::admin(),
        },
        RouteDef {
            pattern: "/session-timeout",
            access: RouteAccess::public(),
        },
    ];
    TABLE
}

/// Find the route matching `path`, ignoring any query string and a
/// trailing slash. `None` means the catch-all applies.
pub fn match_route(path: &str) -> Option<&'static RouteDef> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    route_table()
        .iter()
        .find(|route| segments_match(route.pattern, path))
}

fn segments_match(pattern: &str, path: &str) -> bool {
    let pattern_segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    pattern_segs.len() == path_segs.len()
        && pattern_segs
            .iter()
            .zip(&path_segs)
            .all(|(p, s)| p.starts_with(':') || p == s)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::models::auth::{LoginCredentials, Registration, SessionBundle, User};
    use crate::session::claims::encode_unsigned;
    use crate::session::manager::{AuthBackend, Navigator};
    use crate::session::store::TokenStore;

    // -- Test doubles ------------------------------------------------------

    struct StaticBackend {
        roles: Vec<String>,
        is_admin: bool,
    }

    #[async_trait]
    impl AuthBackend for StaticBackend {
        async fn login(&self, email: &str, _: &str) -> Result<SessionBundle, SessionError> {
            Ok(SessionBundle {
                token: encode_unsigned(&json!({
                    "sub": "u1",
                    "exp": Utc::now().timestamp() + 3600,
                })),
                refresh_token: None,
                user: User {
                    id: "u1".into(),
                    email: email.into(),
                    name: None,
                    roles: self.roles.clone(),
                    is_admin: self.is_admin,
                },
                activity_config: None,
            })
        }

        async fn register(&self, _: &Registration) -> Result<SessionBundle, SessionError> {
            unimplemented!("not used by guard tests")
        }

        async fn refresh(&self, _: &str) -> Result<String, SessionError> {
            Err(SessionError::Token("no refresh in guard tests".into()))
        }

        async fn user_by_email(&self, _: &str) -> Result<Option<User>, SessionError> {
            Ok(None)
        }
    }

    struct NullNavigator;

    impl Navigator for NullNavigator {
        fn navigate(&self, _: &str) {}
    }

    /// Dialog double that actually performs the login when configured.
    struct DialogLogin {
        session: Arc<SessionManager>,
        completes_login: bool,
        scopes: Mutex<Vec<LoginScope>>,
    }

    #[async_trait]
    impl LoginPrompt for DialogLogin {
        async fn prompt_login(&self, scope: LoginScope) -> Result<bool, SessionError> {
            self.scopes.lock().expect("lock").push(scope);
            if !self.completes_login {
                return Ok(false);
            }
            self.session
                .login(&LoginCredentials {
                    email: "ada@example.com".into(),
                    password: "secret".into(),
                    remember_me: false,
                })
                .await?;
            Ok(true)
        }
    }

    struct Fixture {
        session: Arc<SessionManager>,
        _dir: TempDir,
    }

    fn fixture(backend: StaticBackend) -> Fixture {
        let dir = TempDir::new().expect("tempdir");
        let session = Arc::new(SessionManager::new(
            Arc::new(backend),
            Arc::new(NullNavigator),
            TokenStore::with_path(dir.path().join("session.json")),
        ));
        Fixture { session, _dir: dir }
    }

    fn dialog(fx: &Fixture, completes_login: bool) -> DialogLogin {
        DialogLogin {
            session: fx.session.clone(),
            completes_login,
            scopes: Mutex::new(Vec::new()),
        }
    }

    async fn login(fx: &Fixture) {
        fx.session
            .login(&LoginCredentials {
                email: "ada@example.com".into(),
                password: "secret".into(),
                remember_me: false,
            })
            .await
            .expect("login");
    }

    // -- Guard evaluation --------------------------------------------------

    #[tokio::test]
    async fn public_route_allows_anonymous_user() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        let prompt = dialog(&fx, false);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::public()).await;
        assert_eq!(outcome, GuardOutcome::Allow);
        assert!(prompt.scopes.lock().expect("lock").is_empty(), "no dialog");
    }

    #[tokio::test]
    async fn interactive_login_carries_navigation_through() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        let prompt = dialog(&fx, true);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::authenticated()).await;
        assert_eq!(outcome, GuardOutcome::Allow);
        assert_eq!(
            *prompt.scopes.lock().expect("lock"),
            vec![LoginScope::General]
        );
        assert!(fx.session.is_authenticated());
    }

    #[tokio::test]
    async fn cancelled_login_redirects_home() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        let prompt = dialog(&fx, false);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::authenticated()).await;
        assert_eq!(outcome, GuardOutcome::Redirect(HOME));
    }

    #[tokio::test]
    async fn admin_route_asks_for_admin_scoped_login() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: true,
        });
        let prompt = dialog(&fx, true);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::admin()).await;
        assert_eq!(outcome, GuardOutcome::Allow);
        assert_eq!(
            *prompt.scopes.lock().expect("lock"),
            vec![LoginScope::Admin]
        );
    }

    #[tokio::test]
    async fn admin_login_without_admin_rights_redirects() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        let prompt = dialog(&fx, true);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::admin()).await;
        assert_eq!(outcome, GuardOutcome::Redirect(HOME));
    }

    #[tokio::test]
    async fn authenticated_non_admin_is_redirected_without_prompt() {
        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        login(&fx).await;
        let prompt = dialog(&fx, true);

        let outcome = evaluate(&fx.session, &prompt, &RouteAccess::admin()).await;
        assert_eq!(outcome, GuardOutcome::Redirect(HOME));
        assert!(prompt.scopes.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn role_requirement_accepts_any_listed_role() {
        let fx = fixture(StaticBackend {
            roles: vec!["moderator".into()],
            is_admin: false,
        });
        login(&fx).await;
        let prompt = dialog(&fx, false);

        let access = RouteAccess::roles(&["admin", "moderator"]);
        assert_eq!(
            evaluate(&fx.session, &prompt, &access).await,
            GuardOutcome::Allow
        );

        let access = RouteAccess::roles(&["admin"]);
        assert_eq!(
            evaluate(&fx.session, &prompt, &access).await,
            GuardOutcome::Redirect(HOME)
        );
    }

    #[tokio::test]
    async fn dialog_error_counts_as_cancellation() {
        struct FailingPrompt;

        #[async_trait]
        impl LoginPrompt for FailingPrompt {
            async fn prompt_login(&self, _: LoginScope) -> Result<bool, SessionError> {
                Err(SessionError::Dialog("no dialog host".into()))
            }
        }

        let fx = fixture(StaticBackend {
            roles: vec![],
            is_admin: false,
        });
        let outcome = evaluate(&fx.session, &FailingPrompt, &RouteAccess::authenticated()).await;
        assert_eq!(outcome, GuardOutcome::Redirect(HOME));
    }

    // -- Route matching ----------------------------------------------------

    #[test]
    fn exact_paths_match() {
        assert_eq!(match_route("/about").expect("match").pattern, "/about");
        assert_eq!(match_route("/").expect("match").pattern, "/");
    }

    #[test]
    fn param_segments_match_any_value() {
        assert_eq!(match_route("/quiz/42").expect("match").pattern, "/quiz/:id");
        let upload = match_route("/quiz/42/upload").expect("match");
        assert_eq!(upload.pattern, "/quiz/:id/upload");
        assert!(upload.access.require_auth);
    }

    #[test]
    fn query_string_and_trailing_slash_are_ignored() {
        assert_eq!(
            match_route("/quiz/42?preview=1").expect("match").pattern,
            "/quiz/:id"
        );
        assert_eq!(match_route("/about/").expect("match").pattern, "/about");
    }

    #[test]
    fn unknown_path_falls_through_to_catch_all() {
        assert!(match_route("/no-such-page").is_none());
        assert!(match_route("/quiz/42/extra/deep").is_none());
    }

    #[test]
    fn admin_routes_require_admin() {
        let def = match_route("/admin/user").expect("match");
        assert!(def.access.require_admin);
    }
}
