pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod fields;
pub mod interceptor;
pub mod session;
pub mod user;

pub use config::{BlameConfig, DefaultFields, UsersConfig};
pub use entity::{BlameableEntity, CreatorAware, EraserAware, UpdaterAware};
pub use error::{BlameError, BlameResult};
pub use event::BlameEvent;
pub use fields::{BlameableFields, BlameableSpec, FieldDecl, extract_fields, resolve_spec};
pub use interceptor::{BlameInterceptor, DeleteStamp, InterceptorBuilder};
pub use session::AuthenticatedUser;
pub use user::{ActiveUser, ActiveUserProvider};
