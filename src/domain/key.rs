use crate::utils::error::{Result, StorageError};

const POINT_KEY_PATTERN: &str = "the key must match \"/collection/subcollection/id\" pattern";
const SCOPE_KEY_PATTERN: &str = "the key must match \"/collection[/subcollection]\" pattern";

/// Addressing components of a point key (`/collection/subcollection/id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectKey<'a> {
    pub collection: &'a str,
    pub subcollection: &'a str,
    pub id: &'a str,
}

/// Addressing components of a collection-scoped key. A missing
/// subcollection matches everything in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyScope<'a> {
    pub collection: &'a str,
    pub subcollection: Option<&'a str>,
}

/// Parses a key for Get/Create/Update/Upsert/Delete.
pub fn parse(key: &str) -> Result<ObjectKey<'_>> {
    let parts: Vec<&str> = key.splitn(4, '/').collect();
    if parts.len() != 4 || !parts[0].is_empty() {
        return Err(StorageError::bad_request(POINT_KEY_PATTERN));
    }
    if parts[1..].iter().any(|segment| segment.is_empty()) {
        return Err(StorageError::bad_request(POINT_KEY_PATTERN));
    }

    Ok(ObjectKey {
        collection: parts[1],
        subcollection: parts[2],
        id: parts[3],
    })
}

/// Parses a key for List/DeleteByQuery/BulkCreate. Only the collection is
/// required; anything after the subcollection is ignored.
pub fn parse_scope(key: &str) -> Result<KeyScope<'_>> {
    let mut parts = key.splitn(4, '/');
    if parts.next() != Some("") {
        return Err(StorageError::bad_request(SCOPE_KEY_PATTERN));
    }

    let collection = match parts.next() {
        Some(c) if !c.is_empty() => c,
        _ => return Err(StorageError::bad_request(SCOPE_KEY_PATTERN)),
    };
    let subcollection = parts.next().filter(|s| !s.is_empty());

    Ok(KeyScope {
        collection,
        subcollection,
    })
}

/// Object-storage object key: the logical key without its leading `/`.
pub fn object_path(key: &str) -> &str {
    key.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_key() {
        let key = parse("/myindex/mytype/myid").unwrap();
        assert_eq!(key.collection, "myindex");
        assert_eq!(key.subcollection, "mytype");
        assert_eq!(key.id, "myid");
    }

    #[test]
    fn test_identifier_keeps_remaining_slashes() {
        let key = parse("/files/2024/reports/q1.json").unwrap();
        assert_eq!(key.subcollection, "2024");
        assert_eq!(key.id, "reports/q1.json");
    }

    #[test]
    fn test_short_keys_are_bad_requests() {
        for key in ["", "/", "/a", "/a/b", "/a/b/", "//b/c", "/a//c", "a/b/c"] {
            let err = parse(key).unwrap_err();
            assert!(err.is_bad_request(), "key {:?} should be rejected", key);
        }
    }

    #[test]
    fn test_parse_scope() {
        let scope = parse_scope("/user").unwrap();
        assert_eq!(scope.collection, "user");
        assert_eq!(scope.subcollection, None);

        let scope = parse_scope("/user/").unwrap();
        assert_eq!(scope.subcollection, None);

        let scope = parse_scope("/user/admin/42").unwrap();
        assert_eq!(scope.collection, "user");
        assert_eq!(scope.subcollection, Some("admin"));

        assert!(parse_scope("/").unwrap_err().is_bad_request());
        assert!(parse_scope("user").unwrap_err().is_bad_request());
    }

    #[test]
    fn test_object_path() {
        assert_eq!(object_path("/user/a"), "user/a");
        assert_eq!(object_path("user/a"), "user/a");
        assert_eq!(object_path("//user"), "user");
    }
}
