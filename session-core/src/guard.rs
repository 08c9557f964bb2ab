//! Route authorization
//!
//! Every protected view declares the roles allowed to see it. The guard checks the current
//! session against them and either lets the view render, or redirects: to the login page for
//! anonymous users, and to the landing route of their own role for authenticated users lacking
//! the access.

use serde::Deserialize;

use crate::model::{Role, Session};

pub const LOGIN_ROUTE: &str = "/login";

/// Landing route for roles missing in the landing table
pub const FALLBACK_LANDING: &str = "/student/profile";

const DEFAULT_LANDING: [(Role, &str); 4] = [
    (Role::Admin, "/admin/dashboard"),
    (Role::Teacher, "/teacher/home"),
    (Role::Job, "/job/tasks"),
    (Role::Intern, "/intern/dashboard"),
];

/// Single landing table entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LandingRoute {
    pub role: Role,
    pub route: String,
}

/// Routes the guard redirects to
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    /// Login page
    pub login: String,
    /// Landing route of roles not listed in `landing`
    pub fallback: String,
    /// Role to landing route mapping
    pub landing: Vec<LandingRoute>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            login: LOGIN_ROUTE.to_owned(),
            fallback: FALLBACK_LANDING.to_owned(),
            landing: DEFAULT_LANDING
                .into_iter()
                .map(|(role, route)| LandingRoute {
                    role,
                    route: route.to_owned(),
                })
                .collect(),
        }
    }
}

impl RouteTable {
    /// Default destination for the role
    pub fn landing(&self, role: Option<&Role>) -> &str {
        role.and_then(|role| self.landing.iter().find(|entry| &entry.role == role))
            .map_or(self.fallback.as_str(), |entry| entry.route.as_str())
    }
}

/// Guard verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Render,
    Redirect {
        target: String,
        /// Message to show at the target, eg. why the session ended
        notice: Option<String>,
    },
}

impl Decision {
    fn redirect(target: &str, notice: Option<String>) -> Self {
        Self::Redirect {
            target: target.to_owned(),
            notice,
        }
    }
}

/// Authorizes a protected route. Empty `allowed` admits any authenticated role.
pub fn authorize(session: &Session, routes: &RouteTable, allowed: &[Role]) -> Decision {
    if !session.is_authenticated() {
        return Decision::redirect(&routes.login, session.notice.clone());
    }

    let role = session.role.as_ref();
    if allowed.is_empty() || role.is_some_and(|role| allowed.contains(role)) {
        Decision::Render
    } else {
        Decision::redirect(routes.landing(role), None)
    }
}

/// Authorizes a public-only route (login, registration, password reset)
pub fn authorize_public(session: &Session, routes: &RouteTable) -> Decision {
    if session.is_authenticated() {
        Decision::redirect(routes.landing(session.role.as_ref()), None)
    } else {
        Decision::Render
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{User, UserId};

    fn session(role: Role) -> Session {
        Session::authenticated(User::new(UserId::Number(1), role), "T1".into(), 0)
    }

    fn redirect(target: &str) -> Decision {
        Decision::Redirect {
            target: target.to_owned(),
            notice: None,
        }
    }

    #[test]
    fn allowed_role_renders() {
        let routes = RouteTable::default();
        assert_eq!(
            authorize(&session(Role::Student), &routes, &[Role::Student]),
            Decision::Render
        );
        assert_eq!(
            authorize(&session(Role::Admin), &routes, &[Role::Teacher, Role::Admin]),
            Decision::Render
        );
    }

    #[test]
    fn empty_allowed_roles_admit_any_authenticated() {
        let routes = RouteTable::default();
        assert_eq!(authorize(&session(Role::Job), &routes, &[]), Decision::Render);
        assert_eq!(
            authorize(&Session::default(), &routes, &[]),
            redirect(LOGIN_ROUTE)
        );
    }

    #[test]
    fn wrong_role_goes_to_own_landing() {
        let routes = RouteTable::default();
        assert_eq!(
            authorize(&session(Role::Teacher), &routes, &[Role::Admin]),
            redirect("/teacher/home")
        );
        assert_eq!(
            authorize(&session(Role::Admin), &routes, &[Role::Student]),
            redirect("/admin/dashboard")
        );
        assert_eq!(
            authorize(&session(Role::Job), &routes, &[Role::Intern]),
            redirect("/job/tasks")
        );
        assert_eq!(
            authorize(&session(Role::Intern), &routes, &[Role::Job]),
            redirect("/intern/dashboard")
        );
        assert_eq!(
            authorize(&session(Role::Student), &routes, &[Role::Admin]),
            redirect(FALLBACK_LANDING)
        );
    }

    #[test]
    fn unknown_role_falls_back_to_student_landing() {
        let routes = RouteTable::default();
        let role = Role::from("alumni");
        assert_eq!(
            authorize(&session(role), &routes, &[Role::Admin]),
            redirect(FALLBACK_LANDING)
        );
    }

    #[test]
    fn anonymous_goes_to_login_regardless_of_roles() {
        let routes = RouteTable::default();
        for allowed in [
            vec![Role::Admin],
            vec![Role::Student],
            vec![Role::Teacher, Role::Job, Role::Intern],
        ] {
            assert_eq!(
                authorize(&Session::default(), &routes, &allowed),
                redirect(LOGIN_ROUTE)
            );
        }

        let failed = Session {
            error: Some("Invalid email or password.".into()),
            ..Default::default()
        };
        assert_eq!(
            authorize(&failed, &routes, &[Role::Student]),
            redirect(LOGIN_ROUTE)
        );
    }

    #[test]
    fn login_redirect_carries_notice() {
        let routes = RouteTable::default();
        let expired = Session {
            notice: Some("Your session has expired.".into()),
            ..Default::default()
        };

        assert_eq!(
            authorize(&expired, &routes, &[Role::Student]),
            Decision::Redirect {
                target: LOGIN_ROUTE.to_owned(),
                notice: Some("Your session has expired.".into()),
            }
        );
    }

    #[test]
    fn public_routes() {
        let routes = RouteTable::default();
        assert_eq!(
            authorize_public(&Session::default(), &routes),
            Decision::Render
        );
        assert_eq!(
            authorize_public(&session(Role::Teacher), &routes),
            redirect("/teacher/home")
        );
    }

    #[test]
    fn custom_table() {
        let routes = RouteTable {
            landing: vec![LandingRoute {
                role: Role::Student,
                route: "/courses".into(),
            }],
            ..Default::default()
        };

        assert_eq!(
            authorize(&session(Role::Student), &routes, &[Role::Admin]),
            redirect("/courses")
        );
        assert_eq!(
            authorize(&session(Role::Admin), &routes, &[Role::Student]),
            redirect(FALLBACK_LANDING)
        );
    }
}
