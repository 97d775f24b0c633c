use crate::domain::session::ChargeMode;
use crate::error::{PaymentError, PaymentResult};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub user: String,
    pub password: String,
    pub terminal: String,
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// Which terminal a call runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The organization's own terminal: one-time pages and token debits.
    Regular,
    /// The shared terminal that registers and authorizes stored cards.
    Recurring,
}

impl Terminal {
    pub fn for_page(mode: ChargeMode) -> Self {
        match mode {
            ChargeMode::OneTime => Self::Regular,
            ChargeMode::RecurringToken => Self::Recurring,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct OrganizationSecrets {
    user: String,
    password: String,
    terminal: String,
}

/// Looks up gateway credentials by organization.
#[derive(Debug, Clone, Default)]
pub struct GatewayCredentialResolver {
    organizations: HashMap<String, OrganizationSecrets>,
    recurring_terminal: String,
}

impl GatewayCredentialResolver {
    /// Reads `{ORG}_GATEWAY_USER`, `{ORG}_GATEWAY_PASSWORD`, `{ORG}_GATEWAY_TERMINAL`
    /// for every named organization, and `GATEWAY_RECURRING_TERMINAL`.
    pub fn from_env(organizations: &[String]) -> Self {
        let var = |name: String| std::env::var(name).unwrap_or_default();
        let mut resolver = Self {
            organizations: HashMap::new(),
            recurring_terminal: var("GATEWAY_RECURRING_TERMINAL".to_string()),
        };
        for org in organizations {
            let prefix = org.to_uppercase();
            resolver.organizations.insert(
                org.clone(),
                OrganizationSecrets {
                    user: var(format!("{prefix}_GATEWAY_USER")),
                    password: var(format!("{prefix}_GATEWAY_PASSWORD")),
                    terminal: var(format!("{prefix}_GATEWAY_TERMINAL")),
                },
            );
        }
        resolver
    }

    pub fn with_organization(
        mut self,
        organization: &str,
        user: &str,
        password: &str,
        terminal: &str,
    ) -> Self {
        self.organizations.insert(
            organization.to_string(),
            OrganizationSecrets {
                user: user.to_string(),
                password: password.to_string(),
                terminal: terminal.to_string(),
            },
        );
        self
    }

    pub fn with_recurring_terminal(mut self, terminal: &str) -> Self {
        self.recurring_terminal = terminal.to_string();
        self
    }

    pub fn resolve(&self, organization: &str, terminal: Terminal) -> PaymentResult<GatewayCredentials> {
        let secrets = self.organizations.get(organization).ok_or_else(|| {
            PaymentError::Configuration(format!("no gateway credentials for organization {organization}"))
        })?;
        let terminal = match terminal {
            Terminal::Regular => secrets.terminal.clone(),
            Terminal::Recurring => self.recurring_terminal.clone(),
        };
        if secrets.user.is_empty() || secrets.password.is_empty() || terminal.is_empty() {
            return Err(PaymentError::Configuration(format!(
                "gateway credentials are incomplete for organization {organization}"
            )));
        }
        Ok(GatewayCredentials {
            user: secrets.user.clone(),
            password: secrets.password.clone(),
            terminal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurring_uses_shared_terminal() {
        let r = GatewayCredentialResolver::default()
            .with_organization("ben2", "u", "p", "T-1")
            .with_recurring_terminal("T-R");
        assert_eq!(r.resolve("ben2", Terminal::Regular).unwrap().terminal, "T-1");
        assert_eq!(r.resolve("ben2", Terminal::Recurring).unwrap().terminal, "T-R");
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let r = GatewayCredentialResolver::default().with_organization("ben2", "u", "", "T-1");
        assert!(matches!(
            r.resolve("ben2", Terminal::Regular),
            Err(PaymentError::Configuration(_))
        ));
        assert!(matches!(
            r.resolve("nobody", Terminal::Regular),
            Err(PaymentError::Configuration(_))
        ));
    }

    #[test]
    fn debug_hides_password() {
        let c = GatewayCredentials {
            user: "u".into(),
            password: "secret".into(),
            terminal: "t".into(),
        };
        assert!(!format!("{c:?}").contains("secret"));
    }
}
