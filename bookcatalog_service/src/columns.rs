use std::cmp::Ordering;

use crate::api::Book;
use crate::catalog::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Columns of the book table accepted for sorting and searching
pub enum BookColumn {
    Id,
    AuthorId,
    Pages,
    Title,
    CoverImage,
    ReleaseDate,
    Isbn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

impl BookColumn {
    pub const ALL: [BookColumn; 7] = [
        BookColumn::Id,
        BookColumn::AuthorId,
        BookColumn::Pages,
        BookColumn::Title,
        BookColumn::CoverImage,
        BookColumn::ReleaseDate,
        BookColumn::Isbn,
    ];

    /// Name used in query parameters and json payloads
    pub fn name(self) -> &'static str {
        match self {
            BookColumn::Id => "id",
            BookColumn::AuthorId => "author_id",
            BookColumn::Pages => "pages",
            BookColumn::Title => "title",
            BookColumn::CoverImage => "cover_image",
            BookColumn::ReleaseDate => "releaseDate",
            BookColumn::Isbn => "isbn",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }

    pub fn parse_sort(name: &str) -> Result<Self, CatalogError> {
        Self::from_name(name)
            .ok_or_else(|| CatalogError::User(format!("invalid sort column {}", name)))
    }

    pub fn parse_search(name: &str) -> Result<Self, CatalogError> {
        Self::from_name(name)
            .ok_or_else(|| CatalogError::User(format!("invalid search column {}", name)))
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            BookColumn::Id | BookColumn::AuthorId | BookColumn::Pages => ColumnKind::Integer,
            BookColumn::Title
            | BookColumn::CoverImage
            | BookColumn::ReleaseDate
            | BookColumn::Isbn => ColumnKind::Text,
        }
    }

    /// Identifier safe to splice into SQL, mixed case names are quoted
    pub fn sql_name(self) -> &'static str {
        match self {
            BookColumn::ReleaseDate => "\"releaseDate\"",
            other => other.name(),
        }
    }

    pub fn integer_value(self, book: &Book) -> Option<i32> {
        match self {
            BookColumn::Id => Some(book.id),
            BookColumn::AuthorId => book.author_id,
            BookColumn::Pages => Some(book.pages),
            _ => None,
        }
    }

    pub fn text_value(self, book: &Book) -> Option<&str> {
        match self {
            BookColumn::Title => Some(&book.title),
            BookColumn::CoverImage => book.cover_image.as_deref(),
            BookColumn::ReleaseDate => Some(&book.release_date),
            BookColumn::Isbn => book.isbn.as_deref(),
            _ => None,
        }
    }

    /// Ascending order of two books by this column, nulls sort last as in postgres
    pub fn compare(self, left: &Book, right: &Book) -> Ordering {
        match self.kind() {
            ColumnKind::Integer => nulls_last(self.integer_value(left), self.integer_value(right)),
            ColumnKind::Text => nulls_last(self.text_value(left), self.text_value(right)),
        }
    }
}

fn nulls_last<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        match value.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(CatalogError::User(format!("invalid order {}", value))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Search condition resolved against the column type
pub enum SearchFilter {
    /// Exact match on an integer column
    Equals(BookColumn, i32),
    /// Case insensitive substring match on a text column
    Contains(BookColumn, String),
}

impl SearchFilter {
    pub fn new(column: BookColumn, value: &str) -> Result<Self, CatalogError> {
        match column.kind() {
            ColumnKind::Integer => value
                .trim()
                .parse()
                .map(|number| SearchFilter::Equals(column, number))
                .map_err(|_| {
                    CatalogError::User(format!("search value {} is not a valid integer", value))
                }),
            ColumnKind::Text => Ok(SearchFilter::Contains(column, value.to_string())),
        }
    }

    pub fn column(&self) -> BookColumn {
        match self {
            SearchFilter::Equals(column, _) | SearchFilter::Contains(column, _) => *column,
        }
    }

    /// Search value as the caller wrote it, used to rebuild page links
    pub fn value(&self) -> String {
        match self {
            SearchFilter::Equals(_, number) => number.to_string(),
            SearchFilter::Contains(_, text) => text.clone(),
        }
    }

    pub fn matches(&self, book: &Book) -> bool {
        match self {
            SearchFilter::Equals(column, expected) => column.integer_value(book) == Some(*expected),
            SearchFilter::Contains(column, needle) => column
                .text_value(book)
                .map(|text| text.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or_default(),
        }
    }

    /// Pattern for ILIKE with the LIKE wildcards of the value escaped
    pub fn like_pattern(text: &str) -> String {
        let mut pattern = String::with_capacity(text.len() + 2);
        pattern.push('%');
        for character in text.chars() {
            if matches!(character, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(character);
        }
        pattern.push('%');
        pattern
    }
}
