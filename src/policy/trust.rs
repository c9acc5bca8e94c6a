use serde::{Deserialize, Serialize};

/// How strongly a signing key's identity is assured.
///
/// Levels form a total order, weakest first. The derived `Ord` follows the
/// variant order, so `meets` is a plain comparison. The vocabulary is closed:
/// an unknown level fails deserialization before it can reach a comparison
/// (fail-closed, the same discipline the rest of the model follows).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
pub enum KeyTrustLevel {
    #[serde(rename = "untrusted")]
    #[strum(serialize = "untrusted")]
    Untrusted,
    #[serde(rename = "self-signed")]
    #[strum(serialize = "self-signed")]
    SelfSigned,
    #[serde(rename = "organization")]
    #[strum(serialize = "organization")]
    Organization,
    #[serde(rename = "trusted-keyring")]
    #[strum(serialize = "trusted-keyring")]
    TrustedKeyring,
    #[serde(rename = "hardware-backed")]
    #[strum(serialize = "hardware-backed")]
    HardwareBacked,
    #[serde(rename = "fulcio-verified")]
    #[strum(serialize = "fulcio-verified")]
    FulcioVerified,
}

impl KeyTrustLevel {
    /// True when `self` is at least as strong as `required`.
    pub fn meets(self, required: Self) -> bool {
        self >= required
    }
}
