/*!
 * Image reference model
 *
 * Parses container image addresses into their components and derives the
 * scopes used when grouping mirrors:
 *
 * ```text
 * docker://quay.io/ns/repo:v1@sha256:<hex>
 * |-------||------||-----||-||-----------|
 * transport domain  path  tag   digest
 * ```
 *
 * An address without a transport prefix is a docker reference.
 */

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

pub const DOCKER_PROTOCOL: &str = "docker://";
pub const OCI_PROTOCOL: &str = "oci://";

/// Number of hex characters kept by [`ImageSpec::short_digest`]
pub const SHORT_DIGEST_LEN: usize = 12;

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]+(?:[.+_-][a-z0-9]+)*):([a-f0-9]{32,})$").unwrap()
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").unwrap());

/// A parsed image address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSpec {
    /// Transport prefix including `://`
    pub transport: String,
    /// The address without its transport
    pub reference: String,
    /// Repository name: the reference without tag and digest
    pub name: String,
    /// Registry host (and port); empty for local transports
    pub domain: String,
    /// Repository path below the domain
    pub path_component: String,
    /// Tag, empty when absent
    pub tag: String,
    /// `algorithm:hex`, empty when absent
    pub digest: String,
}

impl ImageSpec {
    /// Parse an image address
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let (transport, reference) = match address.find("://") {
            Some(idx) => (&address[..idx + 3], &address[idx + 3..]),
            None => (DOCKER_PROTOCOL, address),
        };

        if reference.is_empty() {
            return Err(parse_error(address, "empty reference"));
        }

        let (name, tag, digest) = split_locator(address, reference)?;
        if name.is_empty() {
            return Err(parse_error(address, "empty repository name"));
        }

        let (domain, path_component) = if transport == DOCKER_PROTOCOL {
            match name.split_once('/') {
                Some((domain, path)) if !domain.is_empty() && !path.is_empty() => {
                    (domain.to_string(), path.to_string())
                }
                _ => {
                    return Err(parse_error(
                        address,
                        "unable to split repository name into domain and path",
                    ))
                }
            }
        } else {
            (String::new(), name.to_string())
        };

        Ok(ImageSpec {
            transport: transport.to_string(),
            reference: reference.to_string(),
            name: name.to_string(),
            domain,
            path_component,
            tag: tag.to_string(),
            digest: digest.to_string(),
        })
    }

    /// The full address including transport
    pub fn reference_with_transport(&self) -> String {
        format!("{}{}", self.transport, self.reference)
    }

    pub fn is_by_digest(&self) -> bool {
        !self.digest.is_empty()
    }

    /// Addressed by digest with no tag
    pub fn is_by_digest_only(&self) -> bool {
        self.tag.is_empty() && !self.digest.is_empty()
    }

    pub fn is_by_tag_and_digest(&self) -> bool {
        !self.tag.is_empty() && !self.digest.is_empty()
    }

    /// Repository path without the domain
    pub fn path_without_domain(&self) -> &str {
        &self.path_component
    }

    /// Last segment of the repository path
    pub fn component_name(&self) -> &str {
        self.path_component
            .rsplit('/')
            .next()
            .unwrap_or(&self.path_component)
    }

    /// Encoded digest truncated to [`SHORT_DIGEST_LEN`] characters
    pub fn short_digest(&self) -> &str {
        let encoded = self
            .digest
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(&self.digest);
        &encoded[..encoded.len().min(SHORT_DIGEST_LEN)]
    }

    /// Canonical locator: `@digest` when a digest is present, else `:tag`
    pub fn locator(&self) -> String {
        if self.is_by_digest() {
            format!("@{}", self.digest)
        } else if !self.tag.is_empty() {
            format!(":{}", self.tag)
        } else {
            String::new()
        }
    }

    /// Repository scope: `domain/path`
    pub fn repository_scope(&self) -> String {
        self.name.clone()
    }

    /// Namespace scope: `domain/ns`, or the bare domain when the path has no namespace
    pub fn namespace_scope(&self) -> String {
        match self.path_component.rsplit_once('/') {
            Some((namespace, _)) => format!("{}/{}", self.domain, namespace),
            None => self.domain.clone(),
        }
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.transport, self.reference)
    }
}

/// Split `name[:tag][@digest]`
fn split_locator<'a>(address: &str, reference: &'a str) -> Result<(&'a str, &'a str, &'a str)> {
    let (rest, digest) = match reference.split_once('@') {
        Some((rest, digest)) => {
            validate_digest(address, digest)?;
            (rest, digest)
        }
        None => (reference, ""),
    };

    // A ':' before the last '/' belongs to a registry port
    let last_segment = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (name, tag) = match rest[last_segment..].rfind(':') {
        Some(i) => (&rest[..last_segment + i], &rest[last_segment + i + 1..]),
        None => (rest, ""),
    };

    if !tag.is_empty() && !TAG_RE.is_match(tag) {
        return Err(parse_error(address, &format!("invalid tag {:?}", tag)));
    }
    if rest.ends_with(':') {
        return Err(parse_error(address, "empty tag"));
    }

    Ok((name, tag, digest))
}

fn validate_digest(address: &str, digest: &str) -> Result<()> {
    let captures = DIGEST_RE
        .captures(digest)
        .ok_or_else(|| parse_error(address, &format!("invalid digest {:?}", digest)))?;

    let expected = match &captures[1] {
        "sha256" => Some(64),
        "sha384" => Some(96),
        "sha512" => Some(128),
        _ => None,
    };
    match expected {
        Some(len) if captures[2].len() != len => Err(parse_error(
            address,
            &format!("{} digest must have {} hex characters", &captures[1], len),
        )),
        _ => Ok(()),
    }
}

fn parse_error(reference: &str, reason: &str) -> MirrorError {
    MirrorError::ReferenceParse {
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
}

/// Fold path components beyond `max_nested_paths` into the last one, joined with `-`
///
/// Some registries limit repository nesting; `0` disables folding.
pub fn with_max_nested_paths(reference: &str, max_nested_paths: usize) -> Result<String> {
    if max_nested_paths == 0 {
        return Ok(reference.to_string());
    }

    let spec = ImageSpec::parse(reference)?;
    let components: Vec<&str> = spec.path_component.split('/').collect();
    if components.len() <= max_nested_paths {
        return Ok(reference.to_string());
    }

    let keep = max_nested_paths - 1;
    let folded = components[keep..].join("-");
    let path = if keep == 0 {
        folded
    } else {
        format!("{}/{}", components[..keep].join("/"), folded)
    };

    Ok(reference.replacen(&spec.path_component, &path, 1))
}

/// What an image is in the mirrored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    ReleaseImage,
    ReleaseContent,
    OperatorBundle,
    OperatorRelatedImage,
    OperatorCatalog,
    UpdateGraph,
    Generic,
    Invalid,
}

impl ImageType {
    /// Mirror-set category for this type
    pub fn category(&self) -> MirrorCategory {
        match self {
            ImageType::ReleaseImage | ImageType::ReleaseContent | ImageType::UpdateGraph => {
                MirrorCategory::Release
            }
            ImageType::OperatorBundle
            | ImageType::OperatorRelatedImage
            | ImageType::OperatorCatalog => MirrorCategory::Operator,
            ImageType::Generic | ImageType::Invalid => MirrorCategory::Generic,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageType::ReleaseImage => "release image",
            ImageType::ReleaseContent => "release content",
            ImageType::OperatorBundle => "operator bundle",
            ImageType::OperatorRelatedImage => "operator related image",
            ImageType::OperatorCatalog => "operator catalog",
            ImageType::UpdateGraph => "update graph",
            ImageType::Generic => "generic",
            ImageType::Invalid => "invalid",
        };
        write!(f, "{}", name)
    }
}

/// Grouping used for mirror sets and copy counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorCategory {
    Release,
    Operator,
    Generic,
}

impl fmt::Display for MirrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorCategory::Release => write!(f, "release"),
            MirrorCategory::Operator => write!(f, "operator"),
            MirrorCategory::Generic => write!(f, "generic"),
        }
    }
}

/// One planned copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyImageSchema {
    pub source: String,
    pub destination: String,
    /// Upstream reference the copy was planned from
    pub origin: String,
    #[serde(rename = "type")]
    pub image_type: ImageType,
}
