use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use culpa_core::{
    ActiveUser, BlameError, BlameInterceptor, BlameResult, BlameableEntity, BlameableFields,
};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ColumnType, ConnectionTrait, DbErr,
    EntityTrait, IdenStatic, IntoActiveModel, Value,
};

static OBSERVER: OnceLock<Arc<BlameInterceptor>> = OnceLock::new();

/// An active model whose entity declares blameable columns. Forward its
/// `ActiveModelBehavior::before_save`/`before_delete` to [`before_save`] and
/// [`before_delete`].
pub trait BlameableModel: ActiveModelTrait + Send + 'static {
    fn blameable_fields() -> BlameableFields;
}

/// Binds `interceptor` for every blameable entity in the process. The first
/// binding wins; later calls return the existing one.
pub fn observe(interceptor: BlameInterceptor) -> Arc<BlameInterceptor> {
    let mut installed = false;
    let bound = OBSERVER.get_or_init(|| {
        installed = true;
        Arc::new(interceptor)
    });

    if !installed {
        tracing::warn!("blame observer already bound; keeping the existing interceptor");
    }

    bound.clone()
}

/// Stamps created-by/updated-by. `insert` is the flag SeaORM passes to
/// `ActiveModelBehavior::before_save`.
pub fn before_save<A: BlameableModel>(mut model: A, insert: bool) -> Result<A, DbErr> {
    let Some(blame) = OBSERVER.get() else {
        return Ok(model);
    };

    let mut entity = ActiveModelEntity {
        model: &mut model,
        persisted: !insert,
    };
    let res = if insert {
        blame.on_creating(&mut entity)
    } else {
        blame.on_updating(&mut entity)
    };
    res.map_err(abort)?;

    Ok(model)
}

/// Stamps deleted-by and persists it before the row is deleted.
pub async fn before_delete<A, C>(mut model: A, db: &C) -> Result<A, DbErr>
where
    A: BlameableModel + ActiveModelBehavior,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    let Some(blame) = OBSERVER.get() else {
        return Ok(model);
    };

    let stamp = blame
        .on_deleting(&mut ActiveModelEntity {
            model: &mut model,
            persisted: true,
        })
        .map_err(abort)?;

    if stamp.requires_persist() {
        model.clone().update(db).await?;
    }

    Ok(model)
}

fn abort(err: BlameError) -> DbErr {
    tracing::warn!(
        %err,
        configuration = err.is_configuration(),
        "blame hook aborted the operation"
    );
    DbErr::Custom(err.to_string())
}

struct ActiveModelEntity<'a, A> {
    model: &'a mut A,
    persisted: bool,
}

impl<A: BlameableModel> BlameableEntity for ActiveModelEntity<'_, A> {
    type Kind = A;

    fn blameable_fields() -> BlameableFields {
        A::blameable_fields()
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn is_dirty(&self, column: &str) -> bool {
        column_named::<A>(column).is_some_and(|c| self.model.get(c).is_set())
    }

    fn assign_blame(&mut self, column: &str, user: &ActiveUser) -> BlameResult<()> {
        let col = column_named::<A>(column)
            .ok_or_else(|| BlameError::UnknownColumn(column.to_string()))?;
        let value = user_id_value(col, user.id)?;
        write_value(self.model, col, value)
    }
}

/// `try_set` rejects a value the model field cannot hold.
fn write_value<A: ActiveModelTrait>(
    model: &mut A,
    col: <A::Entity as EntityTrait>::Column,
    value: Value,
) -> BlameResult<()> {
    model
        .try_set(col, value)
        .map_err(|e| BlameError::IncompatibleColumn {
            column: col.as_str().to_string(),
            reason: e.to_string(),
        })
}

fn column_named<A: ActiveModelTrait>(name: &str) -> Option<<A::Entity as EntityTrait>::Column> {
    <<A::Entity as EntityTrait>::Column as FromStr>::from_str(name).ok()
}

/// Converts a user id to the integer width the column was declared with.
fn user_id_value<C: ColumnTrait>(column: C, id: i64) -> BlameResult<Value> {
    let incompatible = |reason: String| BlameError::IncompatibleColumn {
        column: column.as_str().to_string(),
        reason,
    };
    let out_of_range = |e: std::num::TryFromIntError| {
        incompatible(format!("user id {id} is out of range: {e}"))
    };

    let value = match column.def().get_column_type() {
        ColumnType::BigInteger => Value::BigInt(Some(id)),
        ColumnType::Integer => Value::Int(Some(i32::try_from(id).map_err(out_of_range)?)),
        ColumnType::SmallInteger => {
            Value::SmallInt(Some(i16::try_from(id).map_err(out_of_range)?))
        }
        ColumnType::BigUnsigned => {
            Value::BigUnsigned(Some(u64::try_from(id).map_err(out_of_range)?))
        }
        ColumnType::Unsigned => Value::Unsigned(Some(u32::try_from(id).map_err(out_of_range)?)),
        ColumnType::SmallUnsigned => {
            Value::SmallUnsigned(Some(u16::try_from(id).map_err(out_of_range)?))
        }
        other => return Err(incompatible(format!("{other:?} is not an integer column"))),
    };

    Ok(value)
}
