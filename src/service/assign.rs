//! Allow-listed field assignment with optional per-field validation.
//!
//! A [`SetterSchema`] lists which fields of a target may be written from request input.
//! [`assign`] intersects the input's top-level keys with that list, runs each matched
//! field's validator, and writes the values that pass. Falsy input values (null, false,
//! 0, empty string) are never written and never reported.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Field-level validation errors keyed by field name.
pub type FieldErrors = Map<String, Value>;

/// Read/write access to named fields of an assignment target.
pub trait FieldAccess {
    /// Current value, `Value::Null` when unset.
    fn get_field(&self, key: &str) -> Value;
    fn set_field(&mut self, key: &str, value: Value);
}

impl FieldAccess for Map<String, Value> {
    fn get_field(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    fn set_field(&mut self, key: &str, value: Value) {
        self.insert(key.to_string(), value);
    }
}

/// Validates one incoming value. Returns `Some(error)` to reject it; a falsy error
/// value counts as success.
#[async_trait]
pub trait FieldValidator<T: ?Sized>: Send + Sync {
    async fn validate(&self, target: &T, value: &Value) -> Option<Value>;
}

/// Adapter turning a synchronous closure into a [`FieldValidator`].
pub struct FnValidator<F>(pub F);

#[async_trait]
impl<T, F> FieldValidator<T> for FnValidator<F>
where
    T: ?Sized + Sync,
    F: Fn(&T, &Value) -> Option<Value> + Send + Sync,
{
    async fn validate(&self, target: &T, value: &Value) -> Option<Value> {
        (self.0)(target, value)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SetterConfig {
    /// Only write when the target's current value is falsy.
    pub only_when_falsy: bool,
}

pub struct SetterDescriptor<T: ?Sized> {
    pub key: String,
    pub validation: Option<Arc<dyn FieldValidator<T>>>,
    pub only_when_falsy: bool,
}

impl<T: ?Sized> Clone for SetterDescriptor<T> {
    fn clone(&self) -> Self {
        SetterDescriptor {
            key: self.key.clone(),
            validation: self.validation.clone(),
            only_when_falsy: self.only_when_falsy,
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for SetterDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetterDescriptor")
            .field("key", &self.key)
            .field("validated", &self.validation.is_some())
            .field("only_when_falsy", &self.only_when_falsy)
            .finish()
    }
}

/// Ordered allow-list of assignable fields. Keys are not deduplicated: registering a
/// key twice yields two descriptors, both processed in order.
pub struct SetterSchema<T: ?Sized> {
    setters: Vec<SetterDescriptor<T>>,
}

impl<T: ?Sized> Default for SetterSchema<T> {
    fn default() -> Self {
        SetterSchema { setters: Vec::new() }
    }
}

impl<T: ?Sized> Clone for SetterSchema<T> {
    fn clone(&self) -> Self {
        SetterSchema {
            setters: self.setters.clone(),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for SetterSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.setters.iter()).finish()
    }
}

impl<T: ?Sized> SetterSchema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settable(self, key: impl Into<String>) -> Self {
        self.settable_cfg(key, SetterConfig::default())
    }

    pub fn settable_cfg(mut self, key: impl Into<String>, cfg: SetterConfig) -> Self {
        self.setters.push(SetterDescriptor {
            key: key.into(),
            validation: None,
            only_when_falsy: cfg.only_when_falsy,
        });
        self
    }

    pub fn settable_validator(
        mut self,
        key: impl Into<String>,
        validator: impl FieldValidator<T> + 'static,
    ) -> Self {
        self.setters.push(SetterDescriptor {
            key: key.into(),
            validation: Some(Arc::new(validator)),
            only_when_falsy: false,
        });
        self
    }

    pub fn push(&mut self, descriptor: SetterDescriptor<T>) {
        self.setters.push(descriptor);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SetterDescriptor<T>> {
        self.setters.iter()
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AssignOptions {
    /// Applies the only-when-falsy policy to every field, in addition to per-field config.
    pub only_when_falsy: bool,
}

/// JavaScript-style truthiness over JSON values.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Apply allow-listed fields from `data` to `target`.
///
/// Returns `None` when no validator rejected a value, otherwise the errors keyed by field.
/// A rejected field is left untouched.
pub async fn assign<T>(
    target: &mut T,
    data: &Value,
    schema: &SetterSchema<T>,
    options: AssignOptions,
) -> Option<FieldErrors>
where
    T: FieldAccess + Sync + ?Sized,
{
    let mut errors = FieldErrors::new();
    let Some(input) = data.as_object() else {
        return None;
    };
    // "a.b" counts as a write to "a".
    let present: HashSet<&str> = input
        .keys()
        .map(|k| k.split('.').next().unwrap_or(k.as_str()))
        .collect();

    for setter in schema.iter() {
        if !present.contains(setter.key.as_str()) {
            continue;
        }
        let value = input.get(&setter.key).cloned().unwrap_or(Value::Null);
        if let Some(validator) = &setter.validation {
            if let Some(err) = validator.validate(&*target, &value).await {
                if is_truthy(&err) {
                    errors.insert(setter.key.clone(), err);
                    continue;
                }
            }
        }
        if !is_truthy(&value) {
            continue;
        }
        let only_when_falsy = options.only_when_falsy || setter.only_when_falsy;
        if !only_when_falsy || !is_truthy(&target.get_field(&setter.key)) {
            target.set_field(&setter.key, value);
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Record = Map<String, Value>;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn empty_input_changes_nothing() {
        let schema = SetterSchema::<Record>::new().settable("name");
        let mut obj = record(json!({ "name": "Bob" }));
        assert!(assign(&mut obj, &json!({}), &schema, AssignOptions::default()).await.is_none());
        assert_eq!(obj, record(json!({ "name": "Bob" })));
    }

    #[tokio::test]
    async fn falsy_values_and_unlisted_fields_are_ignored() {
        let schema = SetterSchema::<Record>::new().settable("name");
        let mut obj = record(json!({ "name": "Bob" }));
        let errors = assign(&mut obj, &json!({ "name": "", "age": 5 }), &schema, AssignOptions::default()).await;
        assert!(errors.is_none());
        assert_eq!(obj.get("name"), Some(&json!("Bob")));
        assert!(obj.get("age").is_none());
    }

    #[tokio::test]
    async fn rejected_field_is_reported_and_untouched() {
        let schema = SetterSchema::<Record>::new()
            .settable_validator(
                "email",
                FnValidator(|_: &Record, v: &Value| {
                    (!v.as_str().unwrap_or("").contains('@')).then(|| json!("invalid email"))
                }),
            )
            .settable("name");
        let mut obj = record(json!({ "email": "a@b.c", "name": "Bob" }));
        let errors = assign(&mut obj, &json!({ "email": "nope", "name": "Ann" }), &schema, AssignOptions::default())
            .await
            .unwrap();
        assert_eq!(errors.get("email"), Some(&json!("invalid email")));
        assert_eq!(obj.get("email"), Some(&json!("a@b.c")));
        assert_eq!(obj.get("name"), Some(&json!("Ann")));
    }

    #[tokio::test]
    async fn validator_sees_current_target() {
        let schema = SetterSchema::<Record>::new().settable_validator(
            "count",
            FnValidator(|t: &Record, v: &Value| {
                let current = t.get("count").and_then(Value::as_i64).unwrap_or(0);
                (v.as_i64().unwrap_or(0) < current).then(|| json!("must not decrease"))
            }),
        );
        let mut obj = record(json!({ "count": 3 }));
        let errors = assign(&mut obj, &json!({ "count": 2 }), &schema, AssignOptions::default()).await;
        assert!(errors.is_some());
        assert!(assign(&mut obj, &json!({ "count": 4 }), &schema, AssignOptions::default()).await.is_none());
        assert_eq!(obj.get("count"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn falsy_validator_result_counts_as_success() {
        let schema = SetterSchema::<Record>::new()
            .settable_validator("name", FnValidator(|_: &Record, _: &Value| Some(json!(""))));
        let mut obj = Record::new();
        assert!(assign(&mut obj, &json!({ "name": "Ann" }), &schema, AssignOptions::default()).await.is_none());
        assert_eq!(obj.get("name"), Some(&json!("Ann")));
    }

    #[tokio::test]
    async fn only_when_falsy_keeps_existing_values() {
        let schema = SetterSchema::<Record>::new()
            .settable_cfg("slug", SetterConfig { only_when_falsy: true })
            .settable("title");
        let mut obj = record(json!({ "slug": "first", "title": "" }));
        assign(&mut obj, &json!({ "slug": "second", "title": "T" }), &schema, AssignOptions::default()).await;
        assert_eq!(obj.get("slug"), Some(&json!("first")));
        assert_eq!(obj.get("title"), Some(&json!("T")));

        let mut obj = record(json!({ "title": "kept" }));
        let opts = AssignOptions { only_when_falsy: true };
        assign(&mut obj, &json!({ "title": "new" }), &schema, opts).await;
        assert_eq!(obj.get("title"), Some(&json!("kept")));
    }

    #[tokio::test]
    async fn dotted_keys_match_on_first_segment() {
        let schema = SetterSchema::<Record>::new().settable_validator(
            "address",
            FnValidator(|_: &Record, v: &Value| v.is_null().then(|| json!("address required"))),
        );
        let mut obj = Record::new();
        let errors = assign(&mut obj, &json!({ "address.city": "Paris" }), &schema, AssignOptions::default())
            .await
            .unwrap();
        assert!(errors.contains_key("address"));
        assert!(obj.is_empty());
    }

    #[tokio::test]
    async fn duplicate_setters_are_each_applied() {
        let schema = SetterSchema::<Record>::new()
            .settable("name")
            .settable_cfg("name", SetterConfig { only_when_falsy: true });
        assert_eq!(schema.len(), 2);
        let mut obj = record(json!({ "name": "Bob" }));
        assign(&mut obj, &json!({ "name": "Ann" }), &schema, AssignOptions::default()).await;
        assert_eq!(obj.get("name"), Some(&json!("Ann")));
    }

    #[test]
    fn truthiness_matches_loose_semantics() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!("x"), json!([]), json!({})] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
    }
}
