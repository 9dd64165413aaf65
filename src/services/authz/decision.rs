//! Authorization outcome shared by every transport.

/// Logical header → wire header name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderKeys {
    pub user_id: String,
    pub user_email: String,
    pub user_groups: String,
    pub user_preferred_username: String,
    pub user_jwt: String,
}

impl Default for HeaderKeys {
    fn default() -> Self {
        Self {
            user_id: "x-user-id".into(),
            user_email: "x-user-email".into(),
            user_groups: "x-user-groups".into(),
            user_preferred_username: "x-user-preferred-username".into(),
            user_jwt: "x-user-jwt".into(),
        }
    }
}

impl HeaderKeys {
    /// Wire names in field-check order.
    pub fn names(&self) -> [&str; 5] {
        [
            &self.user_id,
            &self.user_email,
            &self.user_groups,
            &self.user_preferred_username,
            &self.user_jwt,
        ]
    }
}

/// Identity headers in insertion order, keyed by wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHeaders(Vec<(String, String)>);

impl IdentityHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Skips empty values; a repeated name replaces the earlier value.
    pub(crate) fn insert_non_empty(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { headers: IdentityHeaders },
    Deny { reason: String },
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Allowed with no identity attached.
    pub fn allow_anonymous() -> Self {
        Self::Allow {
            headers: IdentityHeaders::default(),
        }
    }
}

#[cfg(test)]
impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Deny { reason } => Some(reason),
            Self::Allow { .. } => None,
        }
    }

    pub fn headers(&self) -> Option<&IdentityHeaders> {
        match self {
            Self::Allow { headers } => Some(headers),
            Self::Deny { .. } => None,
        }
    }
}

pub mod reason {
    pub const EMPTY_CREDENTIAL: &str = "empty credential";
    pub const NOT_CONFIGURED: &str = "exchange path not configured";
    pub const NO_USERNAME: &str = "user info returned no username";
    pub const MISSING_HEADER: &str = "missing authorization header";
    pub const UNREADABLE_HEADER: &str = "authorization header is not valid UTF-8";

    /// Upper bound (in characters) for upstream detail embedded in a reason.
    pub const MAX_DETAIL_CHARS: usize = 200;

    pub fn user_info_failed(err: &dyn std::fmt::Display) -> String {
        format!("user info lookup failed: {}", bounded(err))
    }

    pub fn exchange_failed(err: &dyn std::fmt::Display) -> String {
        format!("token exchange failed: {}", bounded(err))
    }

    pub fn id_token_invalid(err: &dyn std::fmt::Display) -> String {
        format!("id token parse failed: {}", bounded(err))
    }

    fn bounded(err: &dyn std::fmt::Display) -> String {
        let text = err.to_string();
        match text.char_indices().nth(MAX_DETAIL_CHARS) {
            Some((end, _)) => format!("{}...", &text[..end]),
            None => text,
        }
    }
}
