/// Placeholder syntax understood by the target driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every parameter (MySQL)
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

/// Parameterized `INSERT INTO <table> (<columns>) VALUES (<placeholders>)`
/// derived from a header row.
///
/// Table and column names are written verbatim as identifiers. They must come
/// from the operator, never from untrusted input; only values are bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn parameter_count(&self) -> usize {
        self.columns.len()
    }

    /// Render the statement text.
    pub fn to_sql(&self, style: PlaceholderStyle) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|index| match style {
                PlaceholderStyle::QuestionMark => "?".to_string(),
                PlaceholderStyle::Numbered => format!("${}", index),
            })
            .collect::<Vec<_>>();
        self.render(&placeholders)
    }

    /// Render with numbered placeholders, casting parameter `i` through text to
    /// `casts[i]` when it is `Some`. The cast target is emitted as given.
    pub fn to_sql_with_casts(&self, casts: &[Option<String>]) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|index| match casts.get(index - 1).and_then(Option::as_deref) {
                Some(target) => format!("${}::text::{}", index, target),
                None => format!("${}", index),
            })
            .collect::<Vec<_>>();
        self.render(&placeholders)
    }

    fn render(&self, placeholders: &[String]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        )
    }
}

/// Double-quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
