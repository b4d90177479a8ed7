//! # Versioned Dispatch
//!
//! Resource specs carry one optional block per supported API version. Exactly
//! one must be populated; it selects the handler implementation.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectVersionError {
    #[error("no resource spec version specified - please set one of the available spec versions")]
    NoVersion,

    #[error("multiple resource spec versions specified - please set only one spec version")]
    MultipleVersions,
}

/// Pick the single populated version
///
/// # Errors
///
/// Fails when zero or more than one candidate is populated.
pub fn select_version<T>(
    candidates: impl IntoIterator<Item = Option<T>>,
) -> Result<T, SelectVersionError> {
    let mut populated = candidates.into_iter().flatten();
    let selected = populated.next().ok_or(SelectVersionError::NoVersion)?;
    if populated.next().is_some() {
        return Err(SelectVersionError::MultipleVersions);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_version() {
        assert_eq!(select_version([None, Some("v2"), None]), Ok("v2"));
    }

    #[test]
    fn test_no_version() {
        let err = select_version::<&str>([None, None]).unwrap_err();
        assert_eq!(err, SelectVersionError::NoVersion);
        assert_eq!(
            err.to_string(),
            "no resource spec version specified - please set one of the available spec versions"
        );
    }

    #[test]
    fn test_multiple_versions() {
        assert_eq!(
            select_version([Some(1), None, Some(2)]),
            Err(SelectVersionError::MultipleVersions)
        );
    }
}
