//! Generic owner-only authorization gate

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("Resource not found")]
    NotFound,
    #[error("You do not own this resource")]
    Forbidden,
}

/// Anything with a single owning user. Implemented by every resource that
/// supports owner-only mutation.
pub trait Owned {
    fn owner_id(&self) -> usize;
}

/// Precondition gate for destructive or mutating operations on an owned
/// resource. Pure check, no side effects: `NotFound` when the lookup came
/// back empty, `Forbidden` when the requester is not the owner.
pub fn authorize_owner<T: Owned>(
    resource: Option<T>,
    requester_id: usize,
) -> Result<T, OwnershipError> {
    let resource = resource.ok_or(OwnershipError::NotFound)?;
    if resource.owner_id() != requester_id {
        return Err(OwnershipError::Forbidden);
    }
    Ok(resource)
}

#[cfg(test)]
mod tests {

    use super::*;

    struct Note {
        owner: usize,
    }

    impl Owned for Note {
        fn owner_id(&self) -> usize {
            self.owner
        }
    }

    #[test]
    fn owner_passes_the_gate() {
        let note = authorize_owner(Some(Note { owner: 7 }), 7).unwrap();
        assert_eq!(note.owner, 7);
    }

    #[test]
    fn non_owner_is_forbidden() {
        let result = authorize_owner(Some(Note { owner: 7 }), 8);
        assert!(matches!(result, Err(OwnershipError::Forbidden)));
    }

    #[test]
    fn missing_resource_is_not_found() {
        let result = authorize_owner(None::<Note>, 7);
        assert!(matches!(result, Err(OwnershipError::NotFound)));
    }
}
