use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{Book, BookId, NewBook};

const MISSING: &str = "Missing data for required field.";
const NULL: &str = "Field may not be null.";
const EMPTY: &str = "Shorter than minimum length 1.";
const NOT_INTEGER: &str = "Not a valid integer.";
const OUT_OF_RANGE: &str = "Number out of range.";
const NOT_STRING: &str = "Not a valid string.";
const UNKNOWN: &str = "Unknown field.";
const INVALID_TYPE: &str = "Invalid input type.";
const SCHEMA_FIELD: &str = "_schema";

const BOOK_FIELDS: [&str; 6] = [
    "author_id",
    "title",
    "cover_image",
    "pages",
    "releaseDate",
    "isbn",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// Field errors keyed by row index and then by field name
pub struct ValidationErrors(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn add(&mut self, row: usize, field: &str, message: &str) {
        self.0
            .entry(row.to_string())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    /// Messages reported for a field of a row
    pub fn field_errors(&self, row: usize, field: &str) -> Option<&[String]> {
        self.0
            .get(&row.to_string())
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
    }

    pub fn has_row(&self, row: usize) -> bool {
        self.0.contains_key(&row.to_string())
    }

    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self
            .0
            .iter()
            .map(|(row, fields)| {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
                    .collect();
                format!("row {} ({})", row, fields.join(", "))
            })
            .collect();
        f.write_str(&rows.join("; "))
    }
}

/// Checks one JSON row field by field, collecting every failure
struct RowValidator<'a> {
    row: usize,
    object: &'a Map<String, Value>,
    errors: &'a mut ValidationErrors,
}

impl<'a> RowValidator<'a> {
    fn new(row: usize, value: &'a Value, errors: &'a mut ValidationErrors) -> Option<Self> {
        match value.as_object() {
            Some(object) => Some(Self {
                row,
                object,
                errors,
            }),
            None => {
                errors.add(row, SCHEMA_FIELD, INVALID_TYPE);
                None
            }
        }
    }

    fn reject_unknown(&mut self, allowed: &[&str]) {
        for key in self.object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.errors.add(self.row, key, UNKNOWN);
            }
        }
    }

    fn required<T>(
        &mut self,
        field: &str,
        parse: fn(&Value) -> Result<T, &'static str>,
    ) -> Option<T> {
        match self.object.get(field) {
            None => {
                self.errors.add(self.row, field, MISSING);
                None
            }
            Some(Value::Null) => {
                self.errors.add(self.row, field, NULL);
                None
            }
            Some(value) => self.parsed(field, parse(value)),
        }
    }

    /// Returns `Some(None)` for absent or null values and `None` on a type error
    fn optional<T>(
        &mut self,
        field: &str,
        parse: fn(&Value) -> Result<T, &'static str>,
    ) -> Option<Option<T>> {
        match self.object.get(field) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.parsed(field, parse(value)).map(Some),
        }
    }

    fn parsed<T>(&mut self, field: &str, result: Result<T, &'static str>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.errors.add(self.row, field, message);
                None
            }
        }
    }

    fn title(&mut self) -> Option<String> {
        let title = self.required("title", parse_string)?;
        if title.trim().is_empty() {
            self.errors.add(self.row, "title", EMPTY);
            return None;
        }
        Some(title)
    }

    fn new_book(&mut self) -> Option<NewBook> {
        let author_id = self.optional("author_id", parse_integer);
        let title = self.title();
        let cover_image = self.optional("cover_image", parse_string);
        let pages = self.required("pages", parse_integer);
        let release_date = self.required("releaseDate", parse_string);
        let isbn = self.optional("isbn", parse_string);

        Some(NewBook {
            author_id: author_id?,
            title: title?,
            cover_image: cover_image?,
            pages: pages?,
            release_date: release_date?,
            isbn: isbn?,
        })
    }
}

fn parse_integer(value: &Value) -> Result<i32, &'static str> {
    let wide = match value {
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(integer), _) => integer,
            (None, Some(float)) if float.fract() == 0.0 && float.is_finite() => {
                if float.abs() > i64::MAX as f64 {
                    return Err(OUT_OF_RANGE);
                }
                float as i64
            }
            _ => return Err(NOT_INTEGER),
        },
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| NOT_INTEGER)?,
        _ => return Err(NOT_INTEGER),
    };
    i32::try_from(wide).map_err(|_| OUT_OF_RANGE)
}

fn parse_string(value: &Value) -> Result<String, &'static str> {
    value.as_str().map(str::to_string).ok_or(NOT_STRING)
}

/// Validates rows of a create payload. Any `id` present is ignored
pub fn validate_new_books(rows: &[Value]) -> Result<Vec<NewBook>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut books = Vec::with_capacity(rows.len());
    let mut allowed = BOOK_FIELDS.to_vec();
    allowed.push("id");

    for (row, value) in rows.iter().enumerate() {
        let Some(mut validator) = RowValidator::new(row, value, &mut errors) else {
            continue;
        };
        validator.reject_unknown(&allowed);
        if let Some(book) = validator.new_book() {
            books.push(book);
        }
    }
    errors.into_result(books)
}

/// Validates full rows, `id` included, as written by an upsert
pub fn validate_books(rows: &[Value]) -> Result<Vec<Book>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut books = Vec::with_capacity(rows.len());
    let mut allowed = BOOK_FIELDS.to_vec();
    allowed.push("id");

    for (row, value) in rows.iter().enumerate() {
        let Some(mut validator) = RowValidator::new(row, value, &mut errors) else {
            continue;
        };
        validator.reject_unknown(&allowed);
        let id = validator.required("id", parse_integer);
        let book = validator.new_book();
        if let (Some(id), Some(book)) = (id, book) {
            books.push(book.with_id(id));
        }
    }
    errors.into_result(books)
}

/// Extracts the `id` of every row of an update payload
pub fn validate_ids(rows: &[Value]) -> Result<Vec<BookId>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut ids = Vec::with_capacity(rows.len());

    for (row, value) in rows.iter().enumerate() {
        let Some(mut validator) = RowValidator::new(row, value, &mut errors) else {
            continue;
        };
        if let Some(id) = validator.required("id", parse_integer) {
            ids.push(id);
        }
    }
    errors.into_result(ids)
}

#[cfg(test)]
mod validation_tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_valid_row_with_optional_fields_missing() {
        let books = validate_new_books(&[json!({
            "title": "Dune",
            "pages": 412,
            "releaseDate": "1965"
        })])
        .expect("Row should be valid");

        assert_eq!(
            books,
            vec![NewBook {
                author_id: None,
                title: "Dune".to_string(),
                cover_image: None,
                pages: 412,
                release_date: "1965".to_string(),
                isbn: None,
            }]
        );
    }

    #[test]
    fn test_every_invalid_field_is_reported() {
        let errors = validate_new_books(&[
            json!({"title": "A", "pages": 5, "releaseDate": "2001"}),
            json!({"pages": "many", "releaseDate": null, "isbn": 7, "color": "red"}),
        ])
        .expect_err("Second row is invalid");

        assert!(!errors.has_row(0));
        assert_eq!(errors.field_errors(1, "title"), Some(&[MISSING.to_string()][..]));
        assert_eq!(errors.field_errors(1, "pages"), Some(&[NOT_INTEGER.to_string()][..]));
        assert_eq!(errors.field_errors(1, "releaseDate"), Some(&[NULL.to_string()][..]));
        assert_eq!(errors.field_errors(1, "isbn"), Some(&[NOT_STRING.to_string()][..]));
        assert_eq!(errors.field_errors(1, "color"), Some(&[UNKNOWN.to_string()][..]));
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(parse_integer(&json!(12)), Ok(12));
        assert_eq!(parse_integer(&json!(12.0)), Ok(12));
        assert_eq!(parse_integer(&json!(" 42 ")), Ok(42));
        assert_eq!(parse_integer(&json!(12.5)), Err(NOT_INTEGER));
        assert_eq!(parse_integer(&json!(true)), Err(NOT_INTEGER));
        assert_eq!(parse_integer(&json!(5_000_000_000_i64)), Err(OUT_OF_RANGE));
    }

    #[test]
    fn test_empty_title_and_non_object_rows() {
        let errors = validate_new_books(&[
            json!({"title": "  ", "pages": 1, "releaseDate": "1999"}),
            json!([1, 2]),
        ])
        .expect_err("Both rows are invalid");

        assert_eq!(errors.field_errors(0, "title"), Some(&[EMPTY.to_string()][..]));
        assert_eq!(
            errors.field_errors(1, SCHEMA_FIELD),
            Some(&[INVALID_TYPE.to_string()][..])
        );
    }

    #[test]
    fn test_create_ignores_id_and_update_requires_it() {
        let row = json!({"id": 9, "title": "T", "pages": 3, "releaseDate": "2010"});
        let created = validate_new_books(&[row.clone()]).expect("Row should be valid");
        assert_eq!(created[0].title, "T");

        let updated = validate_books(&[row]).expect("Row should be valid");
        assert_eq!(updated[0].id, 9);

        let errors = validate_books(&[json!({"title": "T", "pages": 3, "releaseDate": "2010"})])
            .expect_err("Id is missing");
        assert_eq!(errors.field_errors(0, "id"), Some(&[MISSING.to_string()][..]));
    }

    #[test]
    fn test_errors_serialize_by_row_and_field() {
        let mut errors = ValidationErrors::default();
        errors.add(1, "title", MISSING);

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"1": {"title": [MISSING]}})
        );
    }
}
