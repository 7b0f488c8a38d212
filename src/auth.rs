//! Session cookie for the remote printing service

/// Name prefix of the service's authentication cookie.
pub const AUTH_COOKIE_PREFIX: &str = ".AspNetCore.TLS_Authentication_Cookie";

/// Authentication state carried on outbound requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookie: Option<String>,
}

impl Session {
    /// Pick the authentication cookie out of a raw `name=value; name=value`
    /// cookie string. Other cookies are ignored.
    pub fn from_cookie_header(raw: Option<&str>) -> Self {
        let cookie = raw.and_then(|raw| {
            raw.split(';')
                .map(str::trim)
                .find(|pair| {
                    pair.split_once('=')
                        .map(|(name, value)| {
                            name.starts_with(AUTH_COOKIE_PREFIX) && !value.is_empty()
                        })
                        .unwrap_or(false)
                })
                .map(str::to_string)
        });
        Self { cookie }
    }

    /// `Cookie` header value for authenticated calls.
    pub fn cookie_header(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cookie.is_some()
    }

    /// Check before a batch. A missing cookie does not block printing, the
    /// success notification is simply sent without it.
    pub fn check_before_batch(&self) -> bool {
        if !self.is_authenticated() {
            tracing::warn!(
                "no authentication cookie; success notification will be unauthenticated"
            );
        }
        true
    }
}
