//! Cache identity derivation for wrapped credential commands
//!
//! A wrapped invocation such as `aws --region us-west-2 eks get-token
//! --cluster-name prod` is reduced to a [`ParsedIdentity`] by the parser for
//! its [`CommandFamily`], then combined with the caller's access key into a
//! [`CacheKey`].

use crate::{Error, Result};
use std::path::Path;

/// Identity of a cacheable credential request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Logical cluster the credential is for
    pub cluster_id: String,
    /// Region, for region-scoped providers
    pub region: Option<String>,
    /// Principal that issued the request
    pub access_key: String,
}

/// Identity fields recovered from a command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIdentity {
    /// Cluster name or id, if a recognized flag carried one
    pub cluster_id: Option<String>,
    /// Region, if a recognized flag carried one
    pub region: Option<String>,
}

/// Known families of wrapped commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFamily {
    /// `aws eks get-token`
    AwsCli,
    /// `aws-iam-authenticator token`
    IamAuthenticator,
    /// Anything else; never yields an identity
    Unknown,
}

/// Flag tokens that carry an identity field
#[derive(Debug, Clone, Copy)]
enum Field {
    Cluster,
    Region,
}

impl CommandFamily {
    /// Classify a command by its executable name.
    ///
    /// Both bare names and paths are accepted, so `/usr/local/bin/aws` and
    /// `aws.exe` classify the same as `aws`.
    #[must_use]
    pub fn detect(command: &str) -> Self {
        let name = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);
        let name = name.strip_suffix(".exe").unwrap_or(name);

        match name {
            "aws" => Self::AwsCli,
            "aws-iam-authenticator" => Self::IamAuthenticator,
            _ => Self::Unknown,
        }
    }

    fn field_for(self, flag: &str) -> Option<Field> {
        match (self, flag) {
            (Self::AwsCli, "--cluster-name") | (Self::IamAuthenticator, "-i" | "--cluster-id") => {
                Some(Field::Cluster)
            }
            (Self::AwsCli, "--region") => Some(Field::Region),
            _ => None,
        }
    }

    /// Extract identity fields from the wrapped command's arguments.
    ///
    /// The whole argument list is scanned in order. A recognized flag consumes
    /// the next argument as its value; a flag at the end of the list has no
    /// value and is ignored. When a flag repeats, the last value wins, even
    /// if it is empty.
    #[must_use]
    pub fn parse(self, args: &[String]) -> ParsedIdentity {
        let mut identity = ParsedIdentity::default();
        if self == Self::Unknown {
            return identity;
        }

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let (field, value) = if let Some(field) = self.field_for(arg) {
                let Some(value) = iter.next() else {
                    break;
                };
                (field, value.as_str())
            } else if let Some((flag, value)) = arg.split_once('=')
                && flag.starts_with("--")
                && let Some(field) = self.field_for(flag)
            {
                (field, value)
            } else {
                continue;
            };

            match field {
                Field::Cluster => identity.cluster_id = Some(value.to_string()),
                Field::Region => identity.region = Some(value.to_string()),
            }
        }

        identity
    }
}

/// Parse a wrapped command invocation into its identity fields.
///
/// Never fails: unknown commands and unmatched arguments produce an empty
/// identity, which later degrades into a [`Error::MissingIdentity`].
#[must_use]
pub fn parse(command: &str, args: &[String]) -> ParsedIdentity {
    CommandFamily::detect(command).parse(args)
}

/// Build a complete cache key for an invocation.
pub fn build(command: &str, args: &[String], access_key: &str) -> Result<CacheKey> {
    if access_key.is_empty() {
        return Err(Error::missing_identity("access key identifier is empty"));
    }

    let identity = parse(command, args);
    let Some(cluster_id) = identity.cluster_id.filter(|c| !c.is_empty()) else {
        return Err(Error::missing_identity(format!(
            "no cluster id in command: {command} {}",
            args.join(" ")
        )));
    };

    Ok(CacheKey {
        cluster_id,
        region: identity.region.filter(|r| !r.is_empty()),
        access_key: access_key.to_string(),
    })
}
