//! Declarative request-body validation.
//!
//! A [`Schema`] is an ordered list of fields. Validation walks the fields in
//! order and stops at the first violation; keys the schema does not know are
//! rejected after every declared field has passed. Numeric fields accept
//! numeric strings and come back normalized as JSON numbers.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Str {
        min: usize,
        max: usize,
        pattern: Option<&'static Lazy<Regex>>,
    },
    Int {
        min: Option<Bound>,
        max: Option<Bound>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Fixed(i64),
    CurrentYear,
}

impl Bound {
    fn resolve(self) -> i64 {
        match self {
            Bound::Fixed(n) => n,
            Bound::CurrentYear => i64::from(chrono::Utc::now().year()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub rule: Rule,
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    pub fn validate(&self, body: &Value) -> AppResult<Map<String, Value>> {
        let Value::Object(obj) = body else {
            return Err(invalid("\"value\" must be of type object"));
        };

        let mut normalized = Map::new();
        for field in self.fields {
            let value = obj
                .get(field.name)
                .ok_or_else(|| invalid(format!("\"{}\" is required", field.name)))?;
            normalized.insert(field.name.to_string(), check(field, value)?);
        }

        if let Some(unknown) = obj.keys().find(|k| !self.fields.iter().any(|f| f.name == k.as_str())) {
            return Err(invalid(format!("\"{unknown}\" is not allowed")));
        }

        Ok(normalized)
    }
}

fn check(field: &Field, value: &Value) -> AppResult<Value> {
    let name = field.name;
    match field.rule {
        Rule::Str { min, max, pattern } => {
            let Value::String(s) = value else {
                return Err(invalid(format!("\"{name}\" must be a string")));
            };
            let len = s.chars().count();
            if s.is_empty() {
                return Err(invalid(format!("\"{name}\" is not allowed to be empty")));
            }
            if len < min {
                return Err(invalid(format!(
                    "\"{name}\" length must be at least {min} characters long"
                )));
            }
            if len > max {
                return Err(invalid(format!(
                    "\"{name}\" length must be less than or equal to {max} characters long"
                )));
            }
            if let Some(re) = pattern {
                if !re.is_match(s) {
                    return Err(invalid(format!(
                        "\"{name}\" with value \"{s}\" fails to match the required pattern: /{}/",
                        re.as_str()
                    )));
                }
            }
            Ok(Value::String(s.clone()))
        }
        Rule::Int { min, max } => {
            let n = as_number(value).ok_or_else(|| invalid(format!("\"{name}\" must be a number")))?;
            if n.fract() != 0.0 {
                return Err(invalid(format!("\"{name}\" must be an integer")));
            }
            let n = n as i64;
            if let Some(min) = min.map(Bound::resolve) {
                if n < min {
                    return Err(invalid(format!(
                        "\"{name}\" must be greater than or equal to {min}"
                    )));
                }
            }
            if let Some(max) = max.map(Bound::resolve) {
                if n > max {
                    return Err(invalid(format!("\"{name}\" must be less than or equal to {max}")));
                }
            }
            Ok(Value::from(n))
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

pub static DIGITS_AND_DASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9-]+$").expect("valid isbn regex"));

pub static AUTHOR_SCHEMA: Schema = Schema {
    fields: &[
        Field {
            name: "name",
            rule: Rule::Str {
                min: 2,
                max: 100,
                pattern: None,
            },
        },
        Field {
            name: "country",
            rule: Rule::Str {
                min: 2,
                max: 50,
                pattern: None,
            },
        },
        Field {
            name: "birthYear",
            rule: Rule::Int {
                min: Some(Bound::Fixed(1000)),
                max: Some(Bound::CurrentYear),
            },
        },
    ],
};

pub static BOOK_SCHEMA: Schema = Schema {
    fields: &[
        Field {
            name: "title",
            rule: Rule::Str {
                min: 1,
                max: 200,
                pattern: None,
            },
        },
        Field {
            name: "authorId",
            rule: Rule::Int {
                min: Some(Bound::Fixed(1)),
                max: None,
            },
        },
        Field {
            name: "year",
            rule: Rule::Int {
                min: Some(Bound::Fixed(1000)),
                max: Some(Bound::CurrentYear),
            },
        },
        Field {
            name: "genre",
            rule: Rule::Str {
                min: 2,
                max: 50,
                pattern: None,
            },
        },
        Field {
            name: "isbn",
            rule: Rule::Str {
                min: 1,
                max: usize::MAX,
                pattern: Some(&DIGITS_AND_DASHES),
            },
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(result: AppResult<Map<String, Value>>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn first_violation_wins() {
        let body = json!({"name": "A", "country": "", "birthYear": "abc"});
        assert_eq!(
            message(AUTHOR_SCHEMA.validate(&body)),
            "\"name\" length must be at least 2 characters long"
        );
    }

    #[test]
    fn missing_and_unknown_fields() {
        assert_eq!(
            message(AUTHOR_SCHEMA.validate(&json!({"name": "Orwell"}))),
            "\"country\" is required"
        );
        let body = json!({"name": "Orwell", "country": "UK", "birthYear": 1903, "alias": "Eric"});
        assert_eq!(message(AUTHOR_SCHEMA.validate(&body)), "\"alias\" is not allowed");
        assert_eq!(
            message(AUTHOR_SCHEMA.validate(&json!([1, 2]))),
            "\"value\" must be of type object"
        );
    }

    #[test]
    fn numbers_are_range_checked_and_normalized() {
        let body = json!({"name": "Orwell", "country": "UK", "birthYear": "1903"});
        let normalized = AUTHOR_SCHEMA.validate(&body).unwrap();
        assert_eq!(normalized["birthYear"], json!(1903));

        let future = json!({"name": "Orwell", "country": "UK", "birthYear": 99999});
        assert!(message(AUTHOR_SCHEMA.validate(&future)).contains("less than or equal to"));

        let fractional = json!({"name": "Orwell", "country": "UK", "birthYear": 1903.5});
        assert_eq!(message(AUTHOR_SCHEMA.validate(&fractional)), "\"birthYear\" must be an integer");
    }

    #[test]
    fn isbn_pattern() {
        let mut body = json!({
            "title": "1984", "authorId": 1, "year": 1949, "genre": "Dystopia", "isbn": "978-0451524935"
        });
        assert!(BOOK_SCHEMA.validate(&body).is_ok());

        body["isbn"] = json!("ISBN-1");
        assert_eq!(
            message(BOOK_SCHEMA.validate(&body)),
            "\"isbn\" with value \"ISBN-1\" fails to match the required pattern: /^[0-9-]+$/"
        );
    }

    #[test]
    fn author_id_must_be_positive() {
        let body = json!({
            "title": "1984", "authorId": -1, "year": 1949, "genre": "Dystopia", "isbn": "978-0451524935"
        });
        assert_eq!(
            message(BOOK_SCHEMA.validate(&body)),
            "\"authorId\" must be greater than or equal to 1"
        );
    }
}
