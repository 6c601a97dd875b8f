//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for identifiers and values
//! exchanged with the remote server. Each newtype ensures data validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Item identifiers
// ============================================================================

/// Reserved word for the root container sentinel
pub const ROOT_IDENTIFIER: &str = "root";

/// Reserved word for the working set pseudo-container
pub const WORKING_SET_IDENTIFIER: &str = "working-set";

/// Opaque, stable identifier of a remote item
///
/// Assigned by the server (`OC-FileId`) or, for local items that were never
/// uploaded, a temporary lowercase UUID. Identifiers double as directory
/// names in local storage, so they must be a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Create a new ItemId
    ///
    /// # Errors
    /// Returns error if the ID is empty, reserved, or not a single path component
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidItemId(
                "Item ID cannot be empty".to_string(),
            ));
        }

        if id == ROOT_IDENTIFIER || id == WORKING_SET_IDENTIFIER {
            return Err(DomainError::InvalidItemId(format!(
                "Item ID is a reserved word: {id}"
            )));
        }

        if id == "." || id == ".." || id.contains('/') || id.contains('\0') {
            return Err(DomainError::InvalidItemId(format!(
                "Item ID must be a single path component: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Allocate a fresh temporary identifier for a locally created item
    #[must_use]
    pub fn temporary() -> Self {
        Self(Uuid::new_v4().to_string().to_lowercase())
    }

    /// The identifier carried by the synthetic root record
    #[must_use]
    pub(crate) fn root() -> Self {
        Self(ROOT_IDENTIFIER.to_string())
    }

    /// Returns true if this is the synthetic root record's identifier
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_IDENTIFIER
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ItemId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        // Stored root records round-trip through serde
        if s == ROOT_IDENTIFIER {
            return Ok(Self::root());
        }
        Self::new(s)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

/// Identifier as seen by the host: a real item or one of the two sentinels
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemIdentifier {
    /// The root container of the account
    Root,
    /// Pseudo-container of materialized and favorited items
    WorkingSet,
    /// A catalogued item
    Item(ItemId),
}

impl ItemIdentifier {
    /// Returns the item ID when this identifier names a catalogued item
    #[must_use]
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            ItemIdentifier::Item(id) => Some(id),
            _ => None,
        }
    }
}

impl Display for ItemIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ItemIdentifier::Root => write!(f, "{ROOT_IDENTIFIER}"),
            ItemIdentifier::WorkingSet => write!(f, "{WORKING_SET_IDENTIFIER}"),
            ItemIdentifier::Item(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for ItemIdentifier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROOT_IDENTIFIER => Ok(ItemIdentifier::Root),
            WORKING_SET_IDENTIFIER => Ok(ItemIdentifier::WorkingSet),
            other => ItemId::from_str(other).map(ItemIdentifier::Item),
        }
    }
}

impl TryFrom<String> for ItemIdentifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemIdentifier> for String {
    fn from(identifier: ItemIdentifier) -> Self {
        identifier.to_string()
    }
}

impl From<ItemId> for ItemIdentifier {
    fn from(id: ItemId) -> Self {
        if id.is_root() {
            ItemIdentifier::Root
        } else {
            ItemIdentifier::Item(id)
        }
    }
}

// ============================================================================
// Remote paths
// ============================================================================

/// A server path relative to the base URL (must start with /)
///
/// Represents WebDAV collection or resource paths, e.g.
/// "/remote.php/dav/files/alice/Photos"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

/// Rejects what cannot be a single path segment
fn check_segment(segment: &str, whole: &str) -> Result<(), DomainError> {
    if segment.is_empty() || segment.contains('/') || matches!(segment, "." | "..") {
        return Err(DomainError::InvalidRemotePath(format!(
            "invalid segment {segment:?} in {whole:?}"
        )));
    }
    Ok(())
}

impl RemotePath {
    /// Validates an absolute server path
    ///
    /// # Errors
    /// `InvalidRemotePath` unless the path starts with `/`, has no trailing
    /// `/` and consists of non-empty segments other than `.` and `..`.
    pub fn new(path: String) -> Result<Self, DomainError> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(DomainError::InvalidRemotePath(format!(
                "remote path must be absolute: {path:?}"
            )));
        };
        if !rest.is_empty() {
            for segment in rest.split('/') {
                check_segment(segment, &path)?;
            }
        }
        Ok(Self(path))
    }

    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Appends one segment
    ///
    /// # Errors
    /// `InvalidRemotePath` when `component` is not a single valid segment.
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        check_segment(component, component)?;
        let base = if self.is_root() { "" } else { self.0.as_str() };
        Ok(Self(format!("{base}/{component}")))
    }

    /// The containing path; `None` for `/`
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit_once('/').map(|(head, _)| {
            if head.is_empty() {
                Self::root()
            } else {
                Self(head.to_string())
            }
        })
    }

    /// The last segment; `None` for `/`
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit_once('/').map(|(_, name)| name)
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// Server tokens
// ============================================================================

/// Opaque content revision marker (etag equivalent)
///
/// Servers send etags quoted (`"5f3a..."`) and sometimes weak (`W/"..."`);
/// both decorations are stripped so tokens compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(String);

impl VersionToken {
    /// Create a VersionToken from a raw header value
    ///
    /// # Errors
    /// Returns error if nothing is left after stripping quotes
    pub fn new(raw: String) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let unweak = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let unquoted = unweak.trim_matches('"');

        if unquoted.is_empty() {
            return Err(DomainError::InvalidVersionToken(format!(
                "Version token is empty: {raw:?}"
            )));
        }

        Ok(Self(unquoted.to_string()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for VersionToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        token.0
    }
}

/// Initiator-chosen string linking a background transfer to its item
///
/// Tokens are derived from the item identifier at the time the transfer
/// starts, so they stay meaningful across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Create a new CorrelationToken
    ///
    /// # Errors
    /// Returns error if the token is empty
    pub fn new(token: String) -> Result<Self, DomainError> {
        if token.trim().is_empty() {
            return Err(DomainError::InvalidCorrelationToken(
                "Correlation token cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ItemId> for CorrelationToken {
    fn from(id: &ItemId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl Display for CorrelationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CorrelationToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CorrelationToken> for String {
    fn from(token: CorrelationToken) -> Self {
        token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod item_id_tests {
        use super::*;

        #[test]
        fn test_valid_item_ids() {
            assert!(ItemId::new("00000123oc6xkzbvqmrq".to_string()).is_ok());
            assert!(ItemId::new("photo-1_A".to_string()).is_ok());
        }

        #[test]
        fn test_rejects_empty_and_path_like_ids() {
            assert!(ItemId::new(String::new()).is_err());
            assert!(ItemId::new("a/b".to_string()).is_err());
            assert!(ItemId::new("..".to_string()).is_err());
            assert!(ItemId::new(".".to_string()).is_err());
        }

        #[test]
        fn test_rejects_reserved_words() {
            assert!(ItemId::new(ROOT_IDENTIFIER.to_string()).is_err());
            assert!(ItemId::new(WORKING_SET_IDENTIFIER.to_string()).is_err());
        }

        #[test]
        fn test_temporary_ids_are_lowercase_and_unique() {
            let a = ItemId::temporary();
            let b = ItemId::temporary();
            assert_ne!(a, b);
            assert_eq!(a.as_str(), a.as_str().to_lowercase());
            assert_eq!(a.as_str().len(), 36);
        }

        #[test]
        fn test_root_round_trips_through_serde() {
            let root = ItemId::root();
            let json = serde_json::to_string(&root).unwrap();
            let back: ItemId = serde_json::from_str(&json).unwrap();
            assert!(back.is_root());
        }
    }

    mod item_identifier_tests {
        use super::*;

        #[test]
        fn test_parse_sentinels() {
            assert_eq!(
                "root".parse::<ItemIdentifier>().unwrap(),
                ItemIdentifier::Root
            );
            assert_eq!(
                "working-set".parse::<ItemIdentifier>().unwrap(),
                ItemIdentifier::WorkingSet
            );
        }

        #[test]
        fn test_parse_item() {
            let parsed: ItemIdentifier = "R1".parse().unwrap();
            assert_eq!(parsed.item_id().unwrap().as_str(), "R1");
            assert_eq!(parsed.to_string(), "R1");
        }

        #[test]
        fn test_from_root_item_id() {
            assert_eq!(ItemIdentifier::from(ItemId::root()), ItemIdentifier::Root);
        }
    }

    mod remote_path_tests {
        use super::*;

        #[test]
        fn test_valid_paths() {
            assert!(RemotePath::new("/".to_string()).is_ok());
            assert!(RemotePath::new("/remote.php/dav/files/alice".to_string()).is_ok());
            assert!(RemotePath::new("/a/my file..v2.txt".to_string()).is_ok());
        }

        #[test]
        fn test_invalid_paths() {
            assert!(RemotePath::new("relative".to_string()).is_err());
            assert!(RemotePath::new("/a//b".to_string()).is_err());
            assert!(RemotePath::new("/a/../b".to_string()).is_err());
            assert!(RemotePath::new("/a/".to_string()).is_err());
        }

        #[test]
        fn test_join_and_parent() {
            let home = RemotePath::new("/files/alice".to_string()).unwrap();
            let photos = home.join("Photos").unwrap();
            assert_eq!(photos.as_str(), "/files/alice/Photos");
            assert_eq!(photos.parent().unwrap(), home);
            assert_eq!(photos.file_name(), Some("Photos"));

            assert_eq!(RemotePath::root().join("a").unwrap().as_str(), "/a");
            assert!(RemotePath::root().parent().is_none());
            assert!(home.join("x/y").is_err());
        }
    }

    mod token_tests {
        use super::*;

        #[test]
        fn test_version_token_strips_quotes() {
            let token = VersionToken::new("\"abc\"".to_string()).unwrap();
            assert_eq!(token.as_str(), "abc");

            let weak = VersionToken::new("W/\"abc\"".to_string()).unwrap();
            assert_eq!(weak, token);
        }

        #[test]
        fn test_version_token_rejects_empty() {
            assert!(VersionToken::new("\"\"".to_string()).is_err());
            assert!(VersionToken::new("  ".to_string()).is_err());
        }

        #[test]
        fn test_correlation_token_from_item_id() {
            let id = ItemId::new("R7".to_string()).unwrap();
            let token = CorrelationToken::from(&id);
            assert_eq!(token.as_str(), "R7");
            assert!(CorrelationToken::new(" ".to_string()).is_err());
        }
    }
}
