//! Classification of SPARQL query and update strings.
//!
//! The text is validated with [`spargebra`]. Syntax errors are returned unchanged.

use spargebra::{Query, SparqlSyntaxError, Update};
use std::collections::BTreeSet;
use std::fmt;

/// The kind of results a query produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// A [SELECT](https://www.w3.org/TR/sparql11-query/#select) query.
    Select,
    /// An [ASK](https://www.w3.org/TR/sparql11-query/#ask) query.
    Ask,
    /// A [CONSTRUCT](https://www.w3.org/TR/sparql11-query/#construct) or
    /// [DESCRIBE](https://www.w3.org/TR/sparql11-query/#describe) query. Both produce triples.
    Construct,
    /// Not a query, e.g., an update.
    Unknown,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "SELECT",
            Self::Ask => "ASK",
            Self::Construct => "CONSTRUCT",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// An operation of a [SPARQL update](https://www.w3.org/TR/sparql11-update/).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateOperation {
    /// `INSERT DATA`
    Insert,
    /// `DELETE DATA`
    Delete,
    /// `DELETE`/`INSERT` with a `WHERE` clause, optionally preceded by `WITH`.
    InsertDelete,
    /// `DELETE WHERE`
    DeleteWhere,
    Load,
    Clear,
    Create,
    Drop,
    Add,
    Move,
    Copy,
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::InsertDelete => "insertdelete",
            Self::DeleteWhere => "deletewhere",
            Self::Load => "load",
            Self::Clear => "clear",
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Add => "add",
            Self::Move => "move",
            Self::Copy => "copy",
        })
    }
}

/// The operations contained in an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateTypes {
    /// The text is not an update or contains no operation.
    Unknown,
    /// The distinct operations of the update.
    Operations(BTreeSet<UpdateOperation>),
}

impl UpdateTypes {
    /// Returns whether the update contains `operation`.
    pub fn contains(&self, operation: UpdateOperation) -> bool {
        match self {
            Self::Unknown => false,
            Self::Operations(operations) => operations.contains(&operation),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Determines the type of `query`.
///
/// Usage example:
/// ```
/// use rdf_fusion_endpoint::{query_type, QueryType};
///
/// assert_eq!(query_type("SELECT * WHERE { ?s ?p ?o }")?, QueryType::Select);
/// assert_eq!(query_type("DESCRIBE <http://example.com/>")?, QueryType::Construct);
/// assert_eq!(query_type("CLEAR ALL")?, QueryType::Unknown);
/// assert!(query_type("SELECT WHERE").is_err());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub fn query_type(query: &str) -> Result<QueryType, SparqlSyntaxError> {
    if !is_query_form(query) {
        Update::parse(query, None)?;
        return Ok(QueryType::Unknown);
    }

    Ok(match Query::parse(query, None)? {
        Query::Select { .. } => QueryType::Select,
        Query::Ask { .. } => QueryType::Ask,
        Query::Construct { .. } | Query::Describe { .. } => QueryType::Construct,
    })
}

/// Determines the operations of `update`.
///
/// Usage example:
/// ```
/// use rdf_fusion_endpoint::{update_types, UpdateOperation, UpdateTypes};
///
/// let types = update_types(
///     "DELETE DATA { <http://ex.com/s> <http://ex.com/p> 1 } ; \
///      DELETE DATA { <http://ex.com/s> <http://ex.com/p> 2 }",
/// )?;
/// assert_eq!(types, UpdateTypes::Operations([UpdateOperation::Delete].into()));
/// assert_eq!(update_types("ASK {}")?, UpdateTypes::Unknown);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub fn update_types(update: &str) -> Result<UpdateTypes, SparqlSyntaxError> {
    if is_query_form(update) {
        Query::parse(update, None)?;
        return Ok(UpdateTypes::Unknown);
    }

    Update::parse(update, None)?;
    let operations = operation_keywords(update)
        .into_iter()
        .filter_map(|operation| match operation {
            Operation::Update(operation) => Some(operation),
            Operation::Query => None,
        })
        .collect::<BTreeSet<_>>();
    Ok(if operations.is_empty() {
        UpdateTypes::Unknown
    } else {
        UpdateTypes::Operations(operations)
    })
}

/// Returns whether the first operation of `text` is a query form.
fn is_query_form(text: &str) -> bool {
    matches!(
        operation_keywords(text).first(),
        Some(Operation::Query)
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Query,
    Update(UpdateOperation),
}

/// Classifies the top-level operations of `text` by their leading keywords.
///
/// Operations are separated by `;` outside of groups. `PREFIX` and `BASE` declarations are
/// skipped. Unrecognized leading tokens are ignored, the parser reports them.
fn operation_keywords(text: &str) -> Vec<Operation> {
    let tokens = TopLevelTokens::new(text).collect::<Vec<_>>();
    let mut operations = Vec::new();
    let mut position = 0;
    let mut expect_operation = true;

    while let Some(token) = tokens.get(position) {
        position += 1;
        let word = match token {
            Token::Separator => {
                expect_operation = true;
                continue;
            }
            Token::Word(word) if expect_operation => word.to_ascii_uppercase(),
            _ => continue,
        };

        let next_word = match tokens.get(position) {
            Some(Token::Word(next)) => next.to_ascii_uppercase(),
            _ => String::new(),
        };
        let operation = match word.as_str() {
            "PREFIX" => {
                position += 2;
                continue;
            }
            "BASE" => {
                position += 1;
                continue;
            }
            "SELECT" | "ASK" | "CONSTRUCT" | "DESCRIBE" => Operation::Query,
            "INSERT" if next_word == "DATA" => Operation::Update(UpdateOperation::Insert),
            "DELETE" if next_word == "DATA" => Operation::Update(UpdateOperation::Delete),
            "DELETE" if next_word == "WHERE" => {
                Operation::Update(UpdateOperation::DeleteWhere)
            }
            "INSERT" | "DELETE" | "WITH" => Operation::Update(UpdateOperation::InsertDelete),
            "LOAD" => Operation::Update(UpdateOperation::Load),
            "CLEAR" => Operation::Update(UpdateOperation::Clear),
            "CREATE" => Operation::Update(UpdateOperation::Create),
            "DROP" => Operation::Update(UpdateOperation::Drop),
            "ADD" => Operation::Update(UpdateOperation::Add),
            "MOVE" => Operation::Update(UpdateOperation::Move),
            "COPY" => Operation::Update(UpdateOperation::Copy),
            _ => {
                expect_operation = false;
                continue;
            }
        };
        operations.push(operation);
        expect_operation = false;
    }

    operations
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
    /// A keyword, prefixed name, or variable.
    Word(&'a str),
    /// An IRI reference.
    Iri,
    /// A balanced `{...}`, `(...)` or `[...]` group.
    Group,
    /// The `;` between two update operations.
    Separator,
    /// Anything else.
    Other,
}

/// Iterates over the tokens of a SPARQL string that are not nested in a group.
///
/// Strings, comments and IRIs are skipped as a whole, so brackets inside them do not affect
/// the nesting.
struct TopLevelTokens<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> TopLevelTokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                self.skip_comment();
            } else {
                return;
            }
        }
    }

    fn skip_comment(&mut self) {
        match self.rest().find('\n') {
            Some(end) => self.position += end + 1,
            None => self.position = self.text.len(),
        }
    }

    /// Skips an IRI reference if one starts at the current position.
    fn skip_iri(&mut self) -> bool {
        let rest = self.rest();
        if !rest.starts_with('<') {
            return false;
        }
        for (i, c) in rest.char_indices().skip(1) {
            match c {
                '>' => {
                    self.position += i + 1;
                    return true;
                }
                '<' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' => return false,
                c if c.is_whitespace() => return false,
                _ => (),
            }
        }
        false
    }

    /// Skips a string literal starting at the current position.
    fn skip_string(&mut self, quote: char) {
        let long = format!("{quote}{quote}{quote}");
        if self.rest().starts_with(&long) {
            self.position += 3;
            while !self.rest().is_empty() {
                if self.rest().starts_with(&long) {
                    self.position += 3;
                    return;
                }
                if self.bump() == Some('\\') {
                    self.bump();
                }
            }
            return;
        }

        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '\n' => return,
                c if c == quote => return,
                _ => (),
            }
        }
    }

    /// Skips a balanced group whose opening bracket has already been consumed.
    fn skip_group(&mut self) {
        let mut depth = 1_usize;
        while depth > 0 {
            let Some(c) = self.peek() else {
                return;
            };
            match c {
                '#' => self.skip_comment(),
                '"' | '\'' => self.skip_string(c),
                '<' => {
                    if !self.skip_iri() {
                        self.bump();
                    }
                }
                '{' | '(' | '[' => {
                    depth += 1;
                    self.bump();
                }
                '}' | ')' | ']' => {
                    depth -= 1;
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }
}

impl<'a> Iterator for TopLevelTokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace_and_comments();
        let c = self.peek()?;
        Some(match c {
            ';' => {
                self.bump();
                Token::Separator
            }
            '{' | '(' | '[' => {
                self.bump();
                self.skip_group();
                Token::Group
            }
            '"' | '\'' => {
                self.skip_string(c);
                Token::Other
            }
            '<' if self.skip_iri() => Token::Iri,
            c if is_word_char(c) => {
                let start = self.position;
                while self.peek().is_some_and(is_word_char) {
                    self.bump();
                }
                Token::Word(&self.text[start..self.position])
            }
            _ => {
                self.bump();
                Token::Other
            }
        })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '?' | '$')
}
