// ! WS-Security UsernameToken header
// !
// ! Token material (nonce, creation time, digest) is issued when the strategy
// ! is built, so rendering the header is a pure function of the strategy.
// ! Call [`WsSecurity::renewed`] to issue fresh material.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use quick_xml::escape::escape;
use std::fmt;

use crate::core::error::SoapResult;
use crate::security::SecurityStrategy;
use crate::utils::digest::password_digest;

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const TOKEN_PROFILE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0";
const BASE64_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// How the password travels in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordType {
    /// Plain text password
    #[default]
    Text,
    /// `base64(sha1(nonce + created + password))`
    Digest,
}

impl PasswordType {
    fn type_uri(self) -> String {
        match self {
            Self::Text => format!("{TOKEN_PROFILE}#PasswordText"),
            Self::Digest => format!("{TOKEN_PROFILE}#PasswordDigest"),
        }
    }
}

/// Options for [`WsSecurity`]
#[derive(Debug, Clone)]
pub struct WsSecurityOptions {
    /// How the password is carried in the token
    pub password_type: PasswordType,
    /// Emit a `wsu:Timestamp` block
    pub has_timestamp: bool,
    /// Emit a `wsse:Nonce`
    pub has_nonce: bool,
    /// Timestamp validity in seconds
    pub ttl_secs: u32,
    /// Mark the header `soap:mustUnderstand="1"`
    pub must_understand: bool,
}

impl Default for WsSecurityOptions {
    fn default() -> Self {
        Self {
            password_type: PasswordType::Text,
            has_timestamp: true,
            has_nonce: true,
            ttl_secs: 600,
            must_understand: true,
        }
    }
}

#[derive(Clone)]
struct IssuedToken {
    created: String,
    expires: String,
    nonce: String,
    password: String,
}

/// UsernameToken security header
#[derive(Clone)]
pub struct WsSecurity {
    username: String,
    password: String,
    options: WsSecurityOptions,
    token: IssuedToken,
}

impl WsSecurity {
    /// Create a strategy and issue its token now
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        options: WsSecurityOptions,
    ) -> SoapResult<Self> {
        let nonce = STANDARD.encode(rand::random::<[u8; 16]>());
        Self::issue_at(username, password, options, Utc::now(), nonce)
    }

    /// Create a strategy with caller-supplied token material
    ///
    /// `nonce` is the base64 text placed in `wsse:Nonce`.
    pub fn issue_at(
        username: impl Into<String>,
        password: impl Into<String>,
        options: WsSecurityOptions,
        created: DateTime<Utc>,
        nonce: impl Into<String>,
    ) -> SoapResult<Self> {
        let password = password.into();
        let nonce = if options.has_nonce {
            nonce.into()
        } else {
            String::new()
        };
        let expires = created + Duration::seconds(i64::from(options.ttl_secs));
        let created = created.format(TIMESTAMP_FORMAT).to_string();

        let token_password = match options.password_type {
            PasswordType::Text => password.clone(),
            PasswordType::Digest => password_digest(&nonce, &created, &password)?,
        };

        Ok(Self {
            username: username.into(),
            password,
            token: IssuedToken {
                created,
                expires: expires.format(TIMESTAMP_FORMAT).to_string(),
                nonce,
                password: token_password,
            },
            options,
        })
    }

    /// Same credentials with freshly issued token material
    pub fn renewed(&self) -> SoapResult<Self> {
        Self::new(
            self.username.clone(),
            self.password.clone(),
            self.options.clone(),
        )
    }

    /// Creation time of the current token
    pub fn created(&self) -> &str {
        &self.token.created
    }

    /// Nonce of the current token, empty when disabled
    pub fn nonce(&self) -> &str {
        &self.token.nonce
    }
}

impl fmt::Debug for WsSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSecurity")
            .field("username", &self.username)
            .field("options", &self.options)
            .field("created", &self.token.created)
            .finish_non_exhaustive()
    }
}

impl SecurityStrategy for WsSecurity {
    fn to_xml(&self) -> String {
        let token = &self.token;
        let must_understand = if self.options.must_understand {
            " soap:mustUnderstand=\"1\""
        } else {
            ""
        };

        let mut xml = format!(
            "<wsse:Security{must_understand} xmlns:wsse=\"{WSSE_NS}\" xmlns:wsu=\"{WSU_NS}\">"
        );

        if self.options.has_timestamp {
            xml.push_str(&format!(
                "<wsu:Timestamp wsu:Id=\"Timestamp-{created}\">\
                 <wsu:Created>{created}</wsu:Created>\
                 <wsu:Expires>{expires}</wsu:Expires>\
                 </wsu:Timestamp>",
                created = token.created,
                expires = token.expires,
            ));
        }

        xml.push_str(&format!(
            "<wsse:UsernameToken wsu:Id=\"SecurityToken-{created}\">\
             <wsse:Username>{username}</wsse:Username>\
             <wsse:Password Type=\"{password_type}\">{password}</wsse:Password>",
            created = token.created,
            username = escape(self.username.as_str()),
            password_type = self.options.password_type.type_uri(),
            password = escape(token.password.as_str()),
        ));

        if self.options.has_nonce {
            xml.push_str(&format!(
                "<wsse:Nonce EncodingType=\"{BASE64_ENCODING}\">{}</wsse:Nonce>",
                token.nonce
            ));
        }

        xml.push_str(&format!(
            "<wsu:Created>{}</wsu:Created></wsse:UsernameToken></wsse:Security>",
            token.created
        ));
        xml
    }

    fn name(&self) -> &'static str {
        "ws-security"
    }
}
