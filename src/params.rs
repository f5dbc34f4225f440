//! Directed stored-procedure parameter binding.
//!
//! The repository's stored-procedure surface takes a [`ParamSet`]: an ordered
//! map of named parameters, each either a plain input value or a spec-directed
//! output/return slot. A parameter object (any `Serialize` struct) can seed
//! the set field-by-field, with a spec table overriding individual fields.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::RepositoryError;
use crate::results::{deserialize_json, json_to_sql_value, sql_value_to_json};
use crate::types::SqlValue;

/// Which way a stored-procedure parameter flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    /// Plain input value
    Input,
    /// OUTPUT parameter, populated by the procedure
    Output,
    /// Procedure return value
    Return,
}

/// Declared database type of a directed parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    /// Variable-length Unicode string; requires a length
    VarChar,
    /// Fixed-length Unicode string; requires a length
    Char,
    /// Variable-length ANSI string; requires a length
    AnsiVarChar,
    /// Fixed-length ANSI string; requires a length
    AnsiChar,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    BigInt,
    /// Timestamp without time zone
    DateTime,
    /// Calendar date
    Date,
    /// UUID / GUID
    Uuid,
}

impl SqlKind {
    /// String kinds carry an explicit length; everything else is fixed-size.
    #[must_use]
    pub fn requires_length(&self) -> bool {
        matches!(
            self,
            SqlKind::VarChar | SqlKind::Char | SqlKind::AnsiVarChar | SqlKind::AnsiChar
        )
    }

    /// Whether a runtime value is bindable as this kind.
    #[must_use]
    pub fn matches(&self, value: &SqlValue) -> bool {
        match self {
            SqlKind::VarChar | SqlKind::Char | SqlKind::AnsiVarChar | SqlKind::AnsiChar => {
                matches!(value, SqlValue::Text(_))
            }
            SqlKind::Int | SqlKind::BigInt => matches!(value, SqlValue::Int(_)),
            SqlKind::DateTime => {
                matches!(value, SqlValue::Timestamp(_)) || value.as_timestamp().is_some()
            }
            SqlKind::Date => matches!(value, SqlValue::Date(_)) || value.as_date().is_some(),
            SqlKind::Uuid => matches!(value, SqlValue::Uuid(_)) || value.as_uuid().is_some(),
        }
    }
}

/// A (direction, type, optional length) declaration for one parameter.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let spec = ParamSpec::output(SqlKind::VarChar).with_length(64);
/// let ret = ParamSpec::ret(SqlKind::BigInt);
/// # let _ = (spec, ret);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub direction: ParamDirection,
    pub kind: SqlKind,
    pub length: Option<usize>,
}

impl ParamSpec {
    /// Declare an input parameter with an explicit database type.
    #[must_use]
    pub fn input(kind: SqlKind) -> Self {
        Self {
            direction: ParamDirection::Input,
            kind,
            length: None,
        }
    }

    /// Declare an OUTPUT parameter.
    #[must_use]
    pub fn output(kind: SqlKind) -> Self {
        Self {
            direction: ParamDirection::Output,
            kind,
            length: None,
        }
    }

    /// Declare the procedure's return value.
    #[must_use]
    pub fn ret(kind: SqlKind) -> Self {
        Self {
            direction: ParamDirection::Return,
            kind,
            length: None,
        }
    }

    /// Attach a length to a string-kind spec.
    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Check the spec is internally consistent.
    ///
    /// # Errors
    ///
    /// `RepositoryError::InvalidSpec` when a length-bearing kind has no
    /// length, or a declared length is zero.
    pub fn validate(&self, name: &str) -> Result<(), RepositoryError> {
        if self.kind.requires_length() && self.length.is_none() {
            return Err(RepositoryError::InvalidSpec(format!(
                "parameter '{name}': {:?} spec requires a length",
                self.kind
            )));
        }
        if self.length == Some(0) {
            return Err(RepositoryError::InvalidSpec(format!(
                "parameter '{name}': length must be non-zero"
            )));
        }
        Ok(())
    }
}

/// One named parameter in a [`ParamSet`].
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub name: String,
    pub direction: ParamDirection,
    /// Declared type; `None` for plain inputs, which bind by value.
    pub kind: Option<SqlKind>,
    pub length: Option<usize>,
    /// Input value, or the populated result of an output/return slot.
    pub value: Option<SqlValue>,
}

/// Ordered, name-indexed set of bound parameters.
///
/// Binding order is preserved: it determines positional argument order when a
/// procedure call is rendered for a backend.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    params: Vec<BoundParam>,
    index: std::collections::HashMap<String, usize>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a plain input value. Rebinding a name replaces the earlier entry
    /// in place, keeping its position.
    pub fn input(&mut self, name: impl Into<String>, value: SqlValue) -> &mut Self {
        self.upsert(BoundParam {
            name: name.into(),
            direction: ParamDirection::Input,
            kind: None,
            length: None,
            value: Some(value),
        });
        self
    }

    /// Bind a spec-directed parameter with no value (output/return slots, or
    /// typed inputs populated later).
    ///
    /// # Errors
    ///
    /// `RepositoryError::InvalidSpec` when the spec fails validation.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        spec: ParamSpec,
    ) -> Result<&mut Self, RepositoryError> {
        let name = name.into();
        spec.validate(&name)?;
        self.upsert(BoundParam {
            name,
            direction: spec.direction,
            kind: Some(spec.kind),
            length: spec.length,
            value: None,
        });
        Ok(self)
    }

    /// Bind a spec-directed parameter together with its value.
    ///
    /// # Errors
    ///
    /// `RepositoryError::InvalidSpec` when the spec fails validation,
    /// `RepositoryError::UnsupportedType` when the value's runtime type does
    /// not match the spec's declared kind.
    pub fn bind_with_value(
        &mut self,
        name: impl Into<String>,
        spec: ParamSpec,
        value: SqlValue,
    ) -> Result<&mut Self, RepositoryError> {
        let name = name.into();
        spec.validate(&name)?;
        if !value.is_null() && !spec.kind.matches(&value) {
            return Err(RepositoryError::UnsupportedType(format!(
                "parameter '{name}': value {value:?} does not match declared kind {:?}",
                spec.kind
            )));
        }
        self.upsert(BoundParam {
            name,
            direction: spec.direction,
            kind: Some(spec.kind),
            length: spec.length,
            value: Some(value),
        });
        Ok(self)
    }

    /// Build a set from a parameter object: every serialized field binds as a
    /// plain input, in the object's field order.
    ///
    /// # Errors
    ///
    /// `RepositoryError::ParameterError` when the object does not serialize
    /// to a map; a bare string or scalar is not a parameter object.
    pub fn from_object<T: Serialize>(object: &T) -> Result<Self, RepositoryError> {
        Self::from_object_with_specs(object, &[])
    }

    /// Build a set from a parameter object plus a spec table keyed by field
    /// name. Fields named in the table bind with their spec's direction and
    /// type; the rest bind as plain inputs.
    ///
    /// # Errors
    ///
    /// Spec validation and type-match failures as in [`Self::bind_with_value`],
    /// plus `RepositoryError::ParameterError` for non-map objects.
    pub fn from_object_with_specs<T: Serialize>(
        object: &T,
        specs: &[(&str, ParamSpec)],
    ) -> Result<Self, RepositoryError> {
        let json = serde_json::to_value(object)
            .map_err(|e| RepositoryError::ParameterError(e.to_string()))?;
        let JsonValue::Object(fields) = json else {
            return Err(RepositoryError::ParameterError(
                "parameter object must serialize to a map of named fields".to_string(),
            ));
        };

        let mut set = ParamSet::new();
        for (name, field) in fields {
            let value = json_to_sql_value(&field);
            match specs.iter().find(|(spec_name, _)| *spec_name == name) {
                Some((_, spec)) => {
                    set.bind_with_value(name, *spec, value)?;
                }
                None => {
                    set.input(name, value);
                }
            }
        }
        Ok(set)
    }

    /// Parameters in binding order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, BoundParam> {
        self.params.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Input values in binding order, nulls standing in for unset slots.
    #[must_use]
    pub fn input_values(&self) -> Vec<SqlValue> {
        self.params
            .iter()
            .filter(|p| p.direction == ParamDirection::Input)
            .map(|p| p.value.clone().unwrap_or(SqlValue::Null))
            .collect()
    }

    /// Look up a parameter's value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.index
            .get(name)
            .and_then(|&idx| self.params[idx].value.as_ref())
    }

    /// Look up a parameter's value by name, failing if the name was never
    /// bound or the slot was never populated.
    ///
    /// # Errors
    ///
    /// `RepositoryError::MissingParameter`.
    pub fn require(&self, name: &str) -> Result<&SqlValue, RepositoryError> {
        self.get(name)
            .ok_or_else(|| RepositoryError::MissingParameter(name.to_string()))
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&BoundParam> {
        self.index.get(name).map(|&idx| &self.params[idx])
    }

    /// Populate a slot after execution. Unknown names are ignored; the
    /// procedure may return columns the caller never declared.
    pub fn set_value(&mut self, name: &str, value: SqlValue) {
        let idx = self.index.get(name).copied().or_else(|| {
            self.params
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(name))
        });
        if let Some(idx) = idx {
            self.params[idx].value = Some(value);
        }
    }

    /// Extract a typed result from the populated output/return slots,
    /// matching struct fields against parameter names.
    ///
    /// # Errors
    ///
    /// `RepositoryError::MissingParameter` when a target field has no
    /// corresponding populated parameter.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, RepositoryError> {
        let mut map = JsonMap::new();
        for p in &self.params {
            if p.direction == ParamDirection::Input {
                continue;
            }
            if let Some(value) = &p.value {
                map.insert(p.name.clone(), sql_value_to_json(value));
            }
        }
        deserialize_json(JsonValue::Object(map))
    }

    fn upsert(&mut self, param: BoundParam) {
        if let Some(&idx) = self.index.get(&param.name) {
            self.params[idx] = param;
        } else {
            self.index.insert(param.name.clone(), self.params.len());
            self.params.push(param);
        }
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a BoundParam;
    type IntoIter = std::slice::Iter<'a, BoundParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
