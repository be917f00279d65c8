use crate::db_types::OrderId;
use crate::helpers::ValidationError;

/// Builds the object-storage path for an order attachment: `{uploader_id}/{order_id}/{file_name}`.
///
/// Namespacing by uploader and order prevents collisions between uploads and lets access checks scope to
/// a path prefix. File names carrying path separators or traversal segments are rejected at the boundary.
pub fn object_path(uploader_id: &str, order_id: &OrderId, file_name: &str) -> Result<String, ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::new("file_name", "must not be empty"));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name == "." || file_name == ".." {
        return Err(ValidationError::new("file_name", "must be a bare file name"));
    }
    if uploader_id.contains('/') {
        return Err(ValidationError::new("uploader_id", "must not contain path separators"));
    }
    Ok(format!("{uploader_id}/{}/{file_name}", order_id.as_str()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_namespaced_paths() {
        let oid = OrderId("ord-0000000000ab".into());
        let path = object_path("user-1", &oid, "brief.pdf").unwrap();
        assert_eq!(path, "user-1/ord-0000000000ab/brief.pdf");
    }

    #[test]
    fn rejects_traversal() {
        let oid = OrderId("ord-0000000000ab".into());
        assert!(object_path("user-1", &oid, "../secrets.txt").is_err());
        assert!(object_path("user-1", &oid, "a/b.txt").is_err());
        assert!(object_path("user-1", &oid, "").is_err());
        assert!(object_path("user/1", &oid, "ok.txt").is_err());
    }
}
