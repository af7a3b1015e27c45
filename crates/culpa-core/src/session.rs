use std::future::Future;

use crate::error::BlameResult;
use crate::user::{ActiveUser, ActiveUserProvider};

tokio::task_local! {
    static ACTING_USER: Option<ActiveUser>;
}

/// Runs `fut` with `user` as the acting user. Outside any scope nobody is acting.
pub async fn act_as<F: Future>(user: Option<ActiveUser>, fut: F) -> F::Output {
    ACTING_USER.scope(user, fut).await
}

pub fn act_as_sync<R>(user: Option<ActiveUser>, f: impl FnOnce() -> R) -> R {
    ACTING_USER.sync_scope(user, f)
}

pub fn current() -> Option<ActiveUser> {
    ACTING_USER.try_with(|user| user.clone()).ok().flatten()
}

/// Default provider: whoever the enclosing [`act_as`] scope authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedUser;

impl ActiveUserProvider for AuthenticatedUser {
    fn current(&self) -> BlameResult<Option<ActiveUser>> {
        Ok(current())
    }
}
