//! Field validators built from declarative manifest rules.

use crate::config::ValidationRule;
use crate::service::FieldValidator;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

/// Checks one field against a [`ValidationRule`]. The error is a message string.
pub struct RuleValidator {
    field: String,
    rule: ValidationRule,
    pattern: Option<Regex>,
}

impl RuleValidator {
    /// Compiles the rule's pattern up front; an invalid pattern is reported by the caller.
    pub fn new(field: impl Into<String>, rule: ValidationRule) -> Result<Self, regex::Error> {
        let pattern = rule.pattern.as_deref().map(Regex::new).transpose()?;
        Ok(RuleValidator {
            field: field.into(),
            rule,
            pattern,
        })
    }

    pub fn check(&self, v: &Value) -> Result<(), String> {
        let col = self.field.as_str();
        let rule = &self.rule;
        if v.is_null() {
            if rule.required == Some(true) {
                return Err(format!("{} is required", col));
            }
            return Ok(());
        }
        if let Some(format) = &rule.format {
            validate_format(col, v, format)?;
        }
        if let Some(max) = rule.max_length {
            if let Some(s) = v.as_str() {
                if s.chars().count() > max as usize {
                    return Err(format!("{} must be at most {} characters", col, max));
                }
            }
        }
        if let Some(min) = rule.min_length {
            if let Some(s) = v.as_str() {
                if s.chars().count() < min as usize {
                    return Err(format!("{} must be at least {} characters", col, min));
                }
            }
        }
        if let Some(re) = &self.pattern {
            if let Some(s) = v.as_str() {
                if !re.is_match(s) {
                    return Err(format!("{} does not match required pattern", col));
                }
            }
        }
        if let Some(ref allowed) = rule.allowed {
            if !allowed.iter().any(|a| value_eq(v, a)) {
                return Err(format!(
                    "{} must be one of: {:?}",
                    col,
                    allowed.iter().take(5).collect::<Vec<_>>()
                ));
            }
        }
        if rule.minimum.is_some() || rule.maximum.is_some() {
            // Form bodies carry numbers as strings.
            let n = as_number(v).ok_or_else(|| format!("{} must be a number", col))?;
            if let Some(min) = rule.minimum {
                if n < min {
                    return Err(format!("{} must be at least {}", col, min));
                }
            }
            if let Some(max) = rule.maximum {
                if n > max {
                    return Err(format!("{} must be at most {}", col, max));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: ?Sized + Sync> FieldValidator<T> for RuleValidator {
    async fn validate(&self, _target: &T, value: &Value) -> Option<Value> {
        self.check(value).err().map(Value::String)
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(format!("{} must be a valid email", col));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(format!("{} must be a valid UUID", col));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(v: Value) -> ValidationRule {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn ranges_apply_to_numeric_strings() {
        let v = RuleValidator::new("price", rule(json!({ "minimum": 0, "maximum": 10 }))).unwrap();
        assert!(v.check(&json!(5)).is_ok());
        assert!(v.check(&json!("5")).is_ok());
        assert_eq!(v.check(&json!("-1")).unwrap_err(), "price must be at least 0");
        assert_eq!(v.check(&json!(" 11 ")).unwrap_err(), "price must be at most 10");
        assert_eq!(v.check(&json!("cheap")).unwrap_err(), "price must be a number");
        assert_eq!(v.check(&json!(true)).unwrap_err(), "price must be a number");
        assert!(v.check(&Value::Null).is_ok());
    }

    #[test]
    fn length_and_pattern() {
        let v = RuleValidator::new("code", rule(json!({ "min_length": 2, "max_length": 4, "pattern": "^[A-Z]+$" }))).unwrap();
        assert!(v.check(&json!("AB")).is_ok());
        assert_eq!(v.check(&json!("A")).unwrap_err(), "code must be at least 2 characters");
        assert_eq!(v.check(&json!("ABCDE")).unwrap_err(), "code must be at most 4 characters");
        assert!(v.check(&json!("ab")).is_err());
    }

    #[test]
    fn required_rejects_null_only_when_set() {
        let required = RuleValidator::new("name", rule(json!({ "required": true }))).unwrap();
        assert_eq!(required.check(&Value::Null).unwrap_err(), "name is required");
        let optional = RuleValidator::new("name", ValidationRule::default()).unwrap();
        assert!(optional.check(&Value::Null).is_ok());
    }

    #[test]
    fn allowed_and_range() {
        let v = RuleValidator::new("size", rule(json!({ "allowed": [1, 2, 3], "minimum": 2 }))).unwrap();
        assert!(v.check(&json!(2)).is_ok());
        assert!(v.check(&json!(1)).is_err());
        assert!(v.check(&json!(4)).is_err());
    }

    #[test]
    fn email_format() {
        let v = RuleValidator::new("email", rule(json!({ "format": "email" }))).unwrap();
        assert!(v.check(&json!("a@b.c")).is_ok());
        assert_eq!(v.check(&json!("abc")).unwrap_err(), "email must be a valid email");
    }

    #[test]
    fn bad_pattern_fails_construction() {
        assert!(RuleValidator::new("x", rule(json!({ "pattern": "(" }))).is_err());
    }
}
