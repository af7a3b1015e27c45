use std::fmt;

use crate::config::DefaultFields;
use crate::event::BlameEvent;

/// One entry of a blameable declaration. Keys are kept as written so that
/// unrecognized events can be dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecl {
    Event(String),
    Column { event: String, column: String },
}

impl FieldDecl {
    pub fn event(event: impl Into<String>) -> Self {
        FieldDecl::Event(event.into())
    }

    pub fn column(event: impl Into<String>, column: impl Into<String>) -> Self {
        FieldDecl::Column {
            event: event.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlameableFields(Vec<FieldDecl>);

impl BlameableFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decls(decls: Vec<FieldDecl>) -> Self {
        Self(decls)
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.0.push(FieldDecl::event(event));
        self
    }

    pub fn column(mut self, event: impl Into<String>, column: impl Into<String>) -> Self {
        self.0.push(FieldDecl::column(event, column));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn decls(&self) -> &[FieldDecl] {
        &self.0
    }

    fn explicit_column(&self, event: BlameEvent) -> Option<&str> {
        self.0.iter().rev().find_map(|d| match d {
            FieldDecl::Column { event: e, column } if names(e, event) => Some(column.as_str()),
            _ => None,
        })
    }

    fn lists(&self, event: BlameEvent) -> bool {
        self.0
            .iter()
            .any(|d| matches!(d, FieldDecl::Event(e) if names(e, event)))
    }
}

/// Unknown keys never match, so they drop out of resolution.
fn names(key: &str, event: BlameEvent) -> bool {
    key.parse::<BlameEvent>().is_ok_and(|parsed| parsed == event)
}

impl<S: Into<String>, const N: usize> From<[S; N]> for BlameableFields {
    fn from(events: [S; N]) -> Self {
        Self(events.into_iter().map(FieldDecl::event).collect())
    }
}

impl FromIterator<FieldDecl> for BlameableFields {
    fn from_iter<I: IntoIterator<Item = FieldDecl>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds [`BlameableFields`] from a mixed list of bare events and
/// `event => column` pairs.
#[macro_export]
macro_rules! blameable {
    (@acc [$($out:expr,)*]) => {
        $crate::BlameableFields::from_decls(::std::vec![$($out),*])
    };
    (@acc [$($out:expr,)*] $event:literal => $column:literal $(, $($rest:tt)*)?) => {
        $crate::blameable!(
            @acc [$($out,)* $crate::FieldDecl::column($event, $column),] $($($rest)*)?
        )
    };
    (@acc [$($out:expr,)*] $event:literal $(, $($rest:tt)*)?) => {
        $crate::blameable!(@acc [$($out,)* $crate::FieldDecl::event($event),] $($($rest)*)?)
    };
    ($($items:tt)*) => {
        $crate::blameable!(@acc [] $($items)*)
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlameableSpec {
    columns: [Option<String>; 3],
}

impl BlameableSpec {
    /// With `None`, whether any event is blameable.
    pub fn is_blameable(&self, event: Option<BlameEvent>) -> bool {
        match event {
            Some(event) => self.columns[event.index()].is_some(),
            None => self.columns.iter().any(Option::is_some),
        }
    }

    pub fn column_for(&self, event: BlameEvent) -> Option<&str> {
        self.columns[event.index()].as_deref()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_blameable(None)
    }

    pub fn len(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlameEvent, &str)> {
        BlameEvent::ALL
            .into_iter()
            .filter_map(|e| self.column_for(e).map(|c| (e, c)))
    }

    fn insert(&mut self, event: BlameEvent, column: String) {
        self.columns[event.index()] = Some(column);
    }
}

impl fmt::Display for BlameableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (event, column)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{event}: {column}")?;
        }
        f.write_str("}")
    }
}

pub fn extract_fields(fields: &BlameableFields, defaults: &DefaultFields) -> BlameableSpec {
    let mut spec = BlameableSpec::default();

    for event in BlameEvent::ALL {
        if let Some(column) = fields.explicit_column(event) {
            spec.insert(event, column.to_string());
            continue;
        }

        if fields.lists(event) {
            let column = defaults
                .column(event)
                .map(str::to_string)
                .unwrap_or_else(|| event.fallback_column());
            spec.insert(event, column);
        }
    }

    spec
}

/// A non-empty `explicit` declaration takes precedence over the entity's
/// declared metadata.
pub fn resolve_spec(
    declared: &BlameableFields,
    explicit: Option<&BlameableFields>,
    defaults: &DefaultFields,
) -> BlameableSpec {
    match explicit {
        Some(fields) if !fields.is_empty() => extract_fields(fields, defaults),
        _ => extract_fields(declared, defaults),
    }
}
