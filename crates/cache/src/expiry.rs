//! Freshness checks for cached exec credentials

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of seconds before the real expiry at which an entry is
/// considered stale
pub const DEFAULT_EARLY_MARGIN_SECONDS: u64 = 120;

/// The `ExecCredential` document emitted by exec-credential plugins
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    /// Usually `ExecCredential`
    #[serde(default)]
    pub kind: String,
    /// e.g. `client.authentication.k8s.io/v1beta1`
    #[serde(default)]
    pub api_version: String,
    /// Issued credential
    #[serde(default)]
    pub status: Option<ExecCredentialStatus>,
}

/// The `status` block of an [`ExecCredential`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
    /// RFC3339 expiry of the token
    #[serde(default)]
    pub expiration_timestamp: Option<String>,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
}

/// Decides whether a cached payload can still be handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    early_margin: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_seconds(DEFAULT_EARLY_MARGIN_SECONDS)
    }
}

impl ExpiryPolicy {
    /// Policy that expires entries `early_margin` before their real expiry
    #[must_use]
    pub const fn new(early_margin: Duration) -> Self {
        Self { early_margin }
    }

    /// Policy with the margin given in whole seconds
    #[must_use]
    pub fn from_seconds(seconds: u64) -> Self {
        let margin = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(margin)
    }

    /// The configured margin
    #[must_use]
    pub const fn early_margin(&self) -> Duration {
        self.early_margin
    }

    /// Extract `status.expirationTimestamp` from a cached payload.
    pub fn expiration(payload: &[u8]) -> Result<DateTime<Utc>> {
        let credential: ExecCredential = serde_json::from_slice(payload)
            .map_err(|e| Error::payload(format!("invalid JSON: {e}")))?;

        let timestamp = credential
            .status
            .and_then(|s| s.expiration_timestamp)
            .ok_or_else(|| Error::payload("missing status.expirationTimestamp"))?;

        DateTime::parse_from_rfc3339(&timestamp)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| {
                Error::payload(format!(
                    "unable to parse expiration timestamp ('{timestamp}'): {e}"
                ))
            })
    }

    /// Whether `payload` is expired relative to the current time.
    #[must_use]
    pub fn is_expired(&self, payload: &[u8]) -> bool {
        self.is_expired_at(payload, Utc::now())
    }

    /// Whether `payload` is expired relative to `now`.
    ///
    /// An entry is expired once its expiration is at or before
    /// `now + early_margin`. Payloads that cannot be parsed are always
    /// expired.
    #[must_use]
    pub fn is_expired_at(&self, payload: &[u8], now: DateTime<Utc>) -> bool {
        match Self::expiration(payload) {
            Ok(expires_at) => {
                let expired = now
                    .checked_add_signed(self.early_margin)
                    .is_none_or(|deadline| expires_at <= deadline);
                tracing::debug!(
                    expires_at = %expires_at.to_rfc3339(),
                    margin_secs = self.early_margin.num_seconds(),
                    expired,
                    "Evaluated cache entry expiry"
                );
                expired
            }
            Err(err) => {
                tracing::warn!(error = %err, "Treating unreadable cache entry as expired");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn payload(expires_at: &str) -> Vec<u8> {
        format!(
            r#"{{"kind": "ExecCredential", "apiVersion": "client.authentication.k8s.io/v1alpha1", "spec": {{}}, "status": {{"expirationTimestamp": "{expires_at}", "token": "k8s-aws-v1.LOTS_OF_STUFF_HERE"}}}}"#
        )
        .into_bytes()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_expiration_timestamp() {
        let ts = ExpiryPolicy::expiration(&payload("2020-08-17T18:59:13Z")).unwrap();
        assert_eq!(ts.year(), 2020);
        assert_eq!(ts.month(), 8);
        assert_eq!(ts.day(), 17);
        assert_eq!(ts.hour(), 18);
        assert_eq!(ts.minute(), 59);
        assert_eq!(ts.second(), 13);
    }

    #[test]
    fn parses_offset_timestamps_into_utc() {
        let ts = ExpiryPolicy::expiration(&payload("2020-08-17T20:59:13+02:00")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2020, 8, 17, 18, 59, 13).unwrap());
    }

    #[test]
    fn default_margin_is_two_minutes() {
        assert_eq!(ExpiryPolicy::default().early_margin(), Duration::seconds(120));
    }

    #[test]
    fn fresh_entry_is_not_expired() {
        let policy = ExpiryPolicy::default();
        let expires = now() + Duration::hours(1);
        assert!(!policy.is_expired_at(&payload(&expires.to_rfc3339()), now()));
    }

    #[test]
    fn entry_within_margin_is_expired() {
        let policy = ExpiryPolicy::default();
        let expires = now() + Duration::seconds(30);
        assert!(policy.is_expired_at(&payload(&expires.to_rfc3339()), now()));
    }

    #[test]
    fn entry_in_the_past_is_expired() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired_at(&payload("2020-08-17T18:59:13Z"), now()));
    }

    #[test]
    fn margin_boundary() {
        let policy = ExpiryPolicy::default();
        let at = now() + Duration::seconds(120);
        let after = at + Duration::seconds(1);
        assert!(policy.is_expired_at(&payload(&at.to_rfc3339()), now()));
        assert!(!policy.is_expired_at(&payload(&after.to_rfc3339()), now()));
    }

    #[test]
    fn zero_margin_expires_exactly_at_expiry() {
        let policy = ExpiryPolicy::from_seconds(0);
        let after = now() + Duration::seconds(1);
        assert!(policy.is_expired_at(&payload(&now().to_rfc3339()), now()));
        assert!(!policy.is_expired_at(&payload(&after.to_rfc3339()), now()));
    }

    #[test]
    fn malformed_json_is_expired() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired_at(b"not json", now()));
        assert!(policy.is_expired_at(b"{\"status\": {\"expirationTim", now()));
        assert!(policy.is_expired_at(b"", now()));
    }

    #[test]
    fn invalid_timestamp_is_expired() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired_at(&payload("tomorrow"), now()));
        assert!(policy.is_expired_at(&payload("2099-01-01 00:00:00"), now()));
        assert!(matches!(
            ExpiryPolicy::expiration(&payload("tomorrow")),
            Err(Error::PayloadParse { .. })
        ));
    }

    #[test]
    fn missing_status_is_expired() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired_at(br#"{"kind": "ExecCredential"}"#, now()));
        assert!(policy.is_expired_at(br#"{"status": {"token": "t"}}"#, now()));
    }

    #[test]
    fn is_expired_uses_wall_clock() {
        let policy = ExpiryPolicy::default();
        let far = Utc::now() + Duration::days(365);
        assert!(!policy.is_expired(&payload(&far.to_rfc3339())));
        assert!(policy.is_expired(&payload("2000-01-01T00:00:00Z")));
    }
}
