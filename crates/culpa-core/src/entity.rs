use crate::error::BlameResult;
use crate::fields::BlameableFields;
use crate::user::ActiveUser;

/// What the interceptor needs from a host ORM record.
pub trait BlameableEntity {
    /// Type-level identity the resolved spec is cached under. Usually `Self`;
    /// adapters that borrow a model use the model type.
    type Kind: 'static;

    fn blameable_fields() -> BlameableFields {
        BlameableFields::default()
    }

    fn is_persisted(&self) -> bool;

    /// Whether `column` was assigned in the current change-set.
    fn is_dirty(&self, column: &str) -> bool;

    fn assign_blame(&mut self, column: &str, user: &ActiveUser) -> BlameResult<()>;

    fn creator_aware(&mut self) -> Option<&mut dyn CreatorAware> {
        None
    }

    fn updater_aware(&mut self) -> Option<&mut dyn UpdaterAware> {
        None
    }

    fn eraser_aware(&mut self) -> Option<&mut dyn EraserAware> {
        None
    }
}

/// Caches the user that created the record.
pub trait CreatorAware {
    fn creator(&self) -> Option<&ActiveUser>;
    fn set_creator(&mut self, user: ActiveUser);
}

pub trait UpdaterAware {
    fn updater(&self) -> Option<&ActiveUser>;
    fn set_updater(&mut self, user: ActiveUser);
}

pub trait EraserAware {
    fn eraser(&self) -> Option<&ActiveUser>;
    fn set_eraser(&mut self, user: ActiveUser);
}
