use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{BlameConfig, DefaultFields};
use crate::entity::BlameableEntity;
use crate::error::{BlameError, BlameResult};
use crate::event::BlameEvent;
use crate::fields::{BlameableFields, BlameableSpec, resolve_spec};
use crate::session::AuthenticatedUser;
use crate::user::{ActiveUser, ActiveUserProvider};

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStamp {
    /// The deleted-by column was written; the host must persist the entity
    /// once more before deleting it.
    Stamped,
    Skipped,
}

impl DeleteStamp {
    pub fn requires_persist(self) -> bool {
        matches!(self, DeleteStamp::Stamped)
    }
}

#[derive(Default)]
struct SpecCache {
    specs: RwLock<HashMap<TypeId, Arc<BlameableSpec>>>,
}

impl SpecCache {
    fn get_or_resolve<E: BlameableEntity>(&self, defaults: &DefaultFields) -> Arc<BlameableSpec> {
        let key = TypeId::of::<E::Kind>();
        if let Some(spec) = self
            .specs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return spec.clone();
        }

        let spec = Arc::new(resolve_spec(&E::blameable_fields(), None, defaults));
        tracing::trace!(entity = type_name::<E::Kind>(), %spec, "resolved blameable fields");

        self.specs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(spec)
            .clone()
    }
}

pub struct BlameInterceptor {
    users: Arc<dyn ActiveUserProvider>,
    defaults: DefaultFields,
    cache: SpecCache,
}

impl BlameInterceptor {
    pub fn new(config: &BlameConfig, users: impl ActiveUserProvider + 'static) -> Self {
        Self {
            users: Arc::new(users),
            defaults: config.default_fields.clone(),
            cache: SpecCache::default(),
        }
    }

    pub fn builder(config: BlameConfig) -> InterceptorBuilder {
        InterceptorBuilder {
            config,
            providers: HashMap::new(),
            provider: None,
        }
    }

    pub fn spec_for<E: BlameableEntity>(&self) -> Arc<BlameableSpec> {
        self.cache.get_or_resolve::<E>(&self.defaults)
    }

    /// Bypasses the cache.
    pub fn find_blameable_fields<E: BlameableEntity>(
        &self,
        explicit: &BlameableFields,
    ) -> BlameableSpec {
        resolve_spec(&E::blameable_fields(), Some(explicit), &self.defaults)
    }

    pub fn is_blameable<E: BlameableEntity>(&self, event: Option<BlameEvent>) -> bool {
        self.spec_for::<E>().is_blameable(event)
    }

    pub fn column_for<E: BlameableEntity>(&self, event: BlameEvent) -> Option<String> {
        self.spec_for::<E>().column_for(event).map(str::to_string)
    }

    pub fn on_creating<E: BlameableEntity>(&self, entity: &mut E) -> BlameResult<()> {
        self.update_blameables(entity)
    }

    pub fn on_updating<E: BlameableEntity>(&self, entity: &mut E) -> BlameResult<()> {
        self.update_blameables(entity)
    }

    pub fn on_deleting<E: BlameableEntity>(&self, entity: &mut E) -> BlameResult<DeleteStamp> {
        let Some(user) = self.users.current()? else {
            return Ok(DeleteStamp::Skipped);
        };

        let spec = self.spec_for::<E>();
        let Some(column) = untouched(&spec, entity, BlameEvent::Deleted) else {
            return Ok(DeleteStamp::Skipped);
        };

        stamp::<E>(entity, BlameEvent::Deleted, column, &user)?;
        if let Some(aware) = entity.eraser_aware() {
            aware.set_eraser(user);
        }

        Ok(DeleteStamp::Stamped)
    }

    fn update_blameables<E: BlameableEntity>(&self, entity: &mut E) -> BlameResult<()> {
        let Some(user) = self.users.current()? else {
            return Ok(());
        };

        let spec = self.spec_for::<E>();

        if let Some(column) = untouched(&spec, entity, BlameEvent::Updated) {
            stamp::<E>(entity, BlameEvent::Updated, column, &user)?;
            if let Some(aware) = entity.updater_aware() {
                aware.set_updater(user.clone());
            }
        }

        // Created-by is only ever written on insert.
        if entity.is_persisted() {
            return Ok(());
        }

        if let Some(column) = untouched(&spec, entity, BlameEvent::Created) {
            stamp::<E>(entity, BlameEvent::Created, column, &user)?;
            if let Some(aware) = entity.creator_aware() {
                aware.set_creator(user);
            }
        }

        Ok(())
    }
}

fn untouched<'s, E: BlameableEntity>(
    spec: &'s BlameableSpec,
    entity: &E,
    event: BlameEvent,
) -> Option<&'s str> {
    spec.column_for(event).filter(|column| !entity.is_dirty(column))
}

fn stamp<E: BlameableEntity>(
    entity: &mut E,
    event: BlameEvent,
    column: &str,
    user: &ActiveUser,
) -> BlameResult<()> {
    entity.assign_blame(column, user)?;
    tracing::debug!(
        entity = type_name::<E::Kind>(),
        %event,
        column,
        user_id = user.id,
        "stamped blame column"
    );
    Ok(())
}

/// A configured `users.active_user` must name a registered provider.
pub struct InterceptorBuilder {
    config: BlameConfig,
    providers: HashMap<String, Arc<dyn ActiveUserProvider>>,
    provider: Option<Arc<dyn ActiveUserProvider>>,
}

impl InterceptorBuilder {
    pub fn register_provider(
        mut self,
        name: impl Into<String>,
        provider: impl ActiveUserProvider + 'static,
    ) -> Self {
        self.providers.insert(name.into(), Arc::new(provider));
        self
    }

    pub fn active_user(mut self, provider: impl ActiveUserProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn build(self) -> BlameResult<BlameInterceptor> {
        let users = match self.config.users.active_user.as_deref() {
            Some(name) => self
                .providers
                .get(name)
                .cloned()
                .ok_or_else(|| BlameError::ActiveUserNotInvocable(name.to_string()))?,
            None => self
                .provider
                .unwrap_or_else(|| Arc::new(AuthenticatedUser)),
        };

        Ok(BlameInterceptor {
            users,
            defaults: self.config.default_fields,
            cache: SpecCache::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::blameable;
    use crate::entity::{CreatorAware, EraserAware, UpdaterAware};
    use crate::session;

    const COLUMNS: [&str; 5] = ["created_by", "updated_by", "deleted_by", "killed_by", "author_id"];

    trait Declares: 'static {
        const AWARE: bool = false;
        fn fields() -> BlameableFields;
    }

    struct Full;
    impl Declares for Full {
        const AWARE: bool = true;
        fn fields() -> BlameableFields {
            blameable!["created", "updated", "deleted"]
        }
    }

    struct CreatedOnly;
    impl Declares for CreatedOnly {
        fn fields() -> BlameableFields {
            blameable!["created"]
        }
    }

    struct Undeclared;
    impl Declares for Undeclared {
        fn fields() -> BlameableFields {
            BlameableFields::new()
        }
    }

    struct Ghost;
    impl Declares for Ghost {
        fn fields() -> BlameableFields {
            blameable!["updated" => "ghost_id"]
        }
    }

    static COUNTED_RESOLUTIONS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;
    impl Declares for Counted {
        fn fields() -> BlameableFields {
            COUNTED_RESOLUTIONS.fetch_add(1, Ordering::SeqCst);
            blameable!["updated"]
        }
    }

    struct Row<K> {
        persisted: bool,
        deleted: bool,
        columns: HashMap<String, i64>,
        dirty: HashSet<String>,
        creator: Option<ActiveUser>,
        updater: Option<ActiveUser>,
        eraser: Option<ActiveUser>,
        saves: usize,
        _kind: PhantomData<K>,
    }

    impl<K: Declares> Row<K> {
        fn new() -> Self {
            Self {
                persisted: false,
                deleted: false,
                columns: HashMap::new(),
                dirty: HashSet::new(),
                creator: None,
                updater: None,
                eraser: None,
                saves: 0,
                _kind: PhantomData,
            }
        }

        fn set(&mut self, column: &str, value: i64) {
            self.columns.insert(column.to_string(), value);
            self.dirty.insert(column.to_string());
        }

        fn get(&self, column: &str) -> Option<i64> {
            self.columns.get(column).copied()
        }

        fn save(&mut self) {
            self.persisted = true;
            self.dirty.clear();
            self.saves += 1;
        }

        fn create(&mut self, blame: &BlameInterceptor) -> BlameResult<()> {
            blame.on_creating(self)?;
            self.save();
            Ok(())
        }

        fn update(&mut self, blame: &BlameInterceptor) -> BlameResult<()> {
            blame.on_updating(self)?;
            self.save();
            Ok(())
        }

        fn delete(&mut self, blame: &BlameInterceptor) -> BlameResult<()> {
            if blame.on_deleting(self)?.requires_persist() {
                self.save();
            }
            self.deleted = true;
            Ok(())
        }
    }

    impl<K: Declares> BlameableEntity for Row<K> {
        type Kind = K;

        fn blameable_fields() -> BlameableFields {
            K::fields()
        }

        fn is_persisted(&self) -> bool {
            self.persisted
        }

        fn is_dirty(&self, column: &str) -> bool {
            self.dirty.contains(column)
        }

        fn assign_blame(&mut self, column: &str, user: &ActiveUser) -> BlameResult<()> {
            if !COLUMNS.contains(&column) {
                return Err(BlameError::UnknownColumn(column.to_string()));
            }
            self.set(column, user.id);
            Ok(())
        }

        fn creator_aware(&mut self) -> Option<&mut dyn CreatorAware> {
            if K::AWARE { Some(self) } else { None }
        }

        fn updater_aware(&mut self) -> Option<&mut dyn UpdaterAware> {
            if K::AWARE { Some(self) } else { None }
        }

        fn eraser_aware(&mut self) -> Option<&mut dyn EraserAware> {
            if K::AWARE { Some(self) } else { None }
        }
    }

    impl<K> CreatorAware for Row<K> {
        fn creator(&self) -> Option<&ActiveUser> {
            self.creator.as_ref()
        }
        fn set_creator(&mut self, user: ActiveUser) {
            self.creator = Some(user);
        }
    }

    impl<K> UpdaterAware for Row<K> {
        fn updater(&self) -> Option<&ActiveUser> {
            self.updater.as_ref()
        }
        fn set_updater(&mut self, user: ActiveUser) {
            self.updater = Some(user);
        }
    }

    impl<K> EraserAware for Row<K> {
        fn eraser(&self) -> Option<&ActiveUser> {
            self.eraser.as_ref()
        }
        fn set_eraser(&mut self, user: ActiveUser) {
            self.eraser = Some(user);
        }
    }

    fn switchable(initial: Option<i64>) -> (BlameInterceptor, Arc<Mutex<Option<i64>>>) {
        let acting = Arc::new(Mutex::new(initial));
        let handle = acting.clone();
        let blame = BlameInterceptor::new(&BlameConfig::default(), move || {
            handle.lock().unwrap().map(ActiveUser::new)
        });
        (blame, acting)
    }

    #[test]
    fn created_by_is_set_on_create_and_kept_on_update() {
        let (blame, acting) = switchable(Some(1));
        let mut row = Row::<CreatedOnly>::new();

        row.create(&blame).unwrap();
        assert_eq!(row.get("created_by"), Some(1));

        *acting.lock().unwrap() = Some(2);
        row.update(&blame).unwrap();
        assert_eq!(row.get("created_by"), Some(1));
        assert_eq!(row.get("updated_by"), None);
    }

    #[test]
    fn updated_by_follows_every_update() {
        let (blame, acting) = switchable(Some(1));
        let mut row = Row::<Full>::new();

        row.create(&blame).unwrap();
        assert_eq!(row.get("updated_by"), Some(1));
        assert_eq!(row.get("created_by"), Some(1));

        *acting.lock().unwrap() = Some(2);
        row.update(&blame).unwrap();
        assert_eq!(row.get("updated_by"), Some(2));

        *acting.lock().unwrap() = Some(3);
        row.update(&blame).unwrap();
        assert_eq!(row.get("updated_by"), Some(3));
        assert_eq!(row.get("created_by"), Some(1));
    }

    #[test]
    fn explicit_assignment_is_never_overridden() {
        let (blame, acting) = switchable(Some(1));
        let mut row = Row::<Full>::new();
        row.set("created_by", 42);
        row.create(&blame).unwrap();

        assert_eq!(row.get("created_by"), Some(42));
        assert_eq!(row.get("updated_by"), Some(1));
        assert!(row.creator().is_none());

        *acting.lock().unwrap() = Some(2);
        row.set("updated_by", 99);
        row.update(&blame).unwrap();
        assert_eq!(row.get("updated_by"), Some(99));

        row.set("deleted_by", 77);
        row.delete(&blame).unwrap();
        assert_eq!(row.get("deleted_by"), Some(77));
        assert!(row.eraser().is_none());
    }

    #[test]
    fn no_active_user_writes_nothing() {
        let (blame, _) = switchable(None);
        let mut row = Row::<Full>::new();

        row.create(&blame).unwrap();
        row.update(&blame).unwrap();
        row.delete(&blame).unwrap();

        assert!(row.columns.is_empty());
        assert!(row.deleted);
        assert_eq!(row.saves, 2);
    }

    #[test]
    fn delete_persists_exactly_once_more() {
        let (blame, acting) = switchable(Some(1));
        let mut row = Row::<Full>::new();
        row.create(&blame).unwrap();

        *acting.lock().unwrap() = Some(5);
        row.delete(&blame).unwrap();

        assert_eq!(row.saves, 2);
        assert_eq!(row.get("deleted_by"), Some(5));
        assert_eq!(row.eraser().map(|u| u.id), Some(5));
        assert!(row.deleted);
    }

    #[test]
    fn delete_without_deleted_field_is_skipped() {
        let (blame, _) = switchable(Some(1));
        let mut row = Row::<CreatedOnly>::new();
        row.create(&blame).unwrap();

        assert_eq!(blame.on_deleting(&mut row).unwrap(), DeleteStamp::Skipped);
        assert_eq!(row.get("deleted_by"), None);
    }

    #[test]
    fn undeclared_entity_is_never_touched() {
        let (blame, _) = switchable(Some(1));
        assert!(!blame.is_blameable::<Row<Undeclared>>(None));
        for event in BlameEvent::ALL {
            assert!(!blame.is_blameable::<Row<Undeclared>>(Some(event)));
        }

        let mut row = Row::<Undeclared>::new();
        row.create(&blame).unwrap();
        row.update(&blame).unwrap();
        row.delete(&blame).unwrap();

        assert!(row.columns.is_empty());
        assert_eq!(row.saves, 2);
    }

    #[test]
    fn aware_entities_cache_the_acting_user() {
        let (blame, acting) = switchable(Some(1));
        let mut row = Row::<Full>::new();
        row.create(&blame).unwrap();

        assert_eq!(row.creator().map(|u| u.id), Some(1));
        assert_eq!(row.updater().map(|u| u.id), Some(1));

        *acting.lock().unwrap() = Some(2);
        row.update(&blame).unwrap();
        assert_eq!(row.creator().map(|u| u.id), Some(1));
        assert_eq!(row.updater().map(|u| u.id), Some(2));
    }

    #[test]
    fn unaware_entities_get_columns_only() {
        let (blame, _) = switchable(Some(4));
        let mut row = Row::<CreatedOnly>::new();
        row.create(&blame).unwrap();

        assert_eq!(row.get("created_by"), Some(4));
        assert!(row.creator().is_none());
    }

    #[test]
    fn spec_is_resolved_once_per_type() {
        let (blame, _) = switchable(Some(1));
        let mut first = Row::<Counted>::new();
        let mut second = Row::<Counted>::new();

        first.create(&blame).unwrap();
        first.update(&blame).unwrap();
        second.create(&blame).unwrap();
        first.delete(&blame).unwrap();

        assert_eq!(COUNTED_RESOLUTIONS.load(Ordering::SeqCst), 1);
        assert_eq!(second.get("updated_by"), Some(1));
    }

    #[test]
    fn configured_defaults_name_the_columns() {
        let mut cfg = BlameConfig::default();
        cfg.default_fields.created = Some("author_id".into());
        let blame = BlameInterceptor::new(&cfg, || Some(ActiveUser::new(8)));

        let mut row = Row::<CreatedOnly>::new();
        row.create(&blame).unwrap();

        assert_eq!(row.get("author_id"), Some(8));
        assert_eq!(row.get("created_by"), None);
        assert_eq!(
            blame
                .column_for::<Row<CreatedOnly>>(BlameEvent::Created)
                .as_deref(),
            Some("author_id")
        );
    }

    #[test]
    fn explicit_fields_override_declared_metadata() {
        let (blame, _) = switchable(None);
        let spec = blame.find_blameable_fields::<Row<Full>>(&blameable!["deleted" => "killed_by"]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec.column_for(BlameEvent::Deleted), Some("killed_by"));
        assert_eq!(blame.spec_for::<Row<Full>>().len(), 3);
    }

    #[test]
    fn write_errors_abort_the_event() {
        let (blame, _) = switchable(Some(1));
        let mut row = Row::<Ghost>::new();

        let err = blame.on_updating(&mut row).unwrap_err();
        assert!(matches!(err, BlameError::UnknownColumn(ref c) if c == "ghost_id"));
    }

    #[test]
    fn provider_errors_propagate() {
        struct Broken;
        impl ActiveUserProvider for Broken {
            fn current(&self) -> BlameResult<Option<ActiveUser>> {
                Err(BlameError::Provider("session backend offline".into()))
            }
        }

        let blame = BlameInterceptor::new(&BlameConfig::default(), Broken);
        let mut row = Row::<Full>::new();

        assert!(matches!(blame.on_creating(&mut row), Err(BlameError::Provider(_))));
        assert!(row.columns.is_empty());
    }

    #[test]
    fn unregistered_configured_provider_fails_to_build() {
        let mut cfg = BlameConfig::standard();
        cfg.users.active_user = Some("console".into());

        let err = BlameInterceptor::builder(cfg).build().err().unwrap();
        assert!(matches!(err, BlameError::ActiveUserNotInvocable(ref n) if n == "console"));
        assert!(err.is_configuration());
    }

    #[test]
    fn configured_provider_replaces_session_lookup() {
        let mut cfg = BlameConfig::default();
        cfg.users.active_user = Some("console".into());

        let blame = BlameInterceptor::builder(cfg)
            .register_provider("console", || Some(ActiveUser::named(0, "console")))
            .active_user(|| Some(ActiveUser::new(99)))
            .build()
            .unwrap();

        let mut row = Row::<Full>::new();
        session::act_as_sync(Some(ActiveUser::new(5)), || row.create(&blame)).unwrap();
        assert_eq!(row.get("created_by"), Some(0));
    }

    #[test]
    fn injected_provider_drives_the_stamp() {
        let blame = BlameInterceptor::builder(BlameConfig::standard())
            .active_user(|| Some(ActiveUser::new(12)))
            .build()
            .unwrap();

        let mut row = Row::<Full>::new();
        session::act_as_sync(Some(ActiveUser::new(5)), || row.create(&blame)).unwrap();

        assert_eq!(row.get("created_by"), Some(12));
        assert_eq!(row.get("updated_by"), Some(12));
        assert_eq!(row.creator().map(|u| u.id), Some(12));
    }

    #[test]
    fn default_builder_reads_the_session() {
        let blame = BlameInterceptor::builder(BlameConfig::default()).build().unwrap();

        let mut row = Row::<Full>::new();
        row.create(&blame).unwrap();
        assert!(row.columns.is_empty());

        session::act_as_sync(Some(ActiveUser::new(6)), || row.update(&blame)).unwrap();
        assert_eq!(row.get("updated_by"), Some(6));
        assert_eq!(row.get("created_by"), None);
    }
}
