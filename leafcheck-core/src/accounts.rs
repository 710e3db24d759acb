use std::fmt;

/// One login identity. The secret never appears in `Debug` output or logs;
/// reports and artifact names only ever see the masked identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    email: String,
    secret: String,
}

impl Account {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Local part of the identifier, used for artifact naming.
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }

    /// Masked identifier: first two characters of the local part survive,
    /// the domain stays intact.
    pub fn masked(&self) -> String {
        match self.email.split_once('@') {
            Some((local, domain)) => {
                let visible: String = local.chars().take(2).collect();
                format!("{visible}***@{domain}")
            }
            None => {
                let visible: String = self.email.chars().take(2).collect();
                format!("{visible}***")
            }
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.masked())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Parses the delimited credential string: comma separates pairs, the first
/// colon inside a pair separates identifier from secret. Pairs without a
/// colon are discarded silently.
pub fn parse_accounts(raw: &str) -> Vec<Account> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|pair| {
            let (email, secret) = pair.split_once(':')?;
            Some(Account::new(email.trim(), secret))
        })
        .filter(|account| !account.email().is_empty())
        .collect()
}
