use super::AssetError;

/// Normalize a source path.
///
/// - Replaces backslashes with forward slashes
/// - Collapses redundant separators and drops `.` segments
/// - Strips leading and trailing slashes
///
/// Returns `Err(AssetError::InvalidPath)` if the path is empty or contains `..`.
pub fn normalize(path: &str) -> Result<String, AssetError> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();

    for segment in replaced.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(AssetError::InvalidPath(format!(
                "'{path}': path traversal (..) not allowed"
            )));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(AssetError::InvalidPath("empty path".into()));
    }

    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_and_dots() {
        assert_eq!(
            normalize("\\shaders//./post/blur.frag/").unwrap(),
            "shaders/post/blur.frag"
        );
    }

    #[test]
    fn reject_dotdot() {
        assert!(normalize("shaders/../secret.txt").is_err());
    }

    #[test]
    fn reject_empty() {
        assert!(normalize("").is_err());
        assert!(normalize("/./").is_err());
    }
}
