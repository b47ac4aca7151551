//! Term and solution building shared by the results decoders.

use crate::results::QuerySolution;
use oxrdf::{BlankNode, Literal, NamedNode, Term, Variable};
use serde::Deserialize;
use std::sync::Arc;

/// An RDF term as written in a results document, before it is validated.
///
/// IRIs and blank node identifiers are taken as sent, so relative IRIs returned by an endpoint
/// are kept.
#[derive(Debug, Deserialize)]
pub(super) struct RawTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    language: Option<String>,
    datatype: Option<String>,
}

impl RawTerm {
    pub(super) fn new(
        kind: &str,
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    ) -> Self {
        Self {
            kind: kind.to_owned(),
            value,
            language,
            datatype,
        }
    }

    pub(super) fn into_term(self) -> Result<Term, String> {
        Ok(match self.kind.as_str() {
            "uri" => NamedNode::new_unchecked(self.value).into(),
            "bnode" => BlankNode::new_unchecked(self.value).into(),
            "literal" | "typed-literal" => match (self.language, self.datatype) {
                (Some(language), _) => Literal::new_language_tagged_literal(self.value, language)
                    .map_err(|e| e.to_string())?
                    .into(),
                (None, Some(datatype)) => {
                    Literal::new_typed_literal(self.value, NamedNode::new_unchecked(datatype))
                        .into()
                }
                (None, None) => Literal::new_simple_literal(self.value).into(),
            },
            kind => return Err(format!("Unsupported RDF term type '{kind}'")),
        })
    }
}

/// The variables of a document.
///
/// Starts with the variables of the head. Variables that only occur in bindings are appended.
#[derive(Debug, Default)]
pub(super) struct Variables {
    list: Vec<Variable>,
    shared: Option<Arc<[Variable]>>,
}

impl Variables {
    pub(super) fn index_of(&mut self, name: &str) -> Result<usize, String> {
        if let Some(index) = self.list.iter().position(|v| v.as_str() == name) {
            return Ok(index);
        }
        self.list
            .push(Variable::new(name).map_err(|e| format!("Invalid variable '{name}': {e}"))?);
        self.shared = None;
        Ok(self.list.len() - 1)
    }

    pub(super) fn solution(
        &mut self,
        binding: impl IntoIterator<Item = (String, RawTerm)>,
    ) -> Result<QuerySolution, String> {
        let mut values = vec![None; self.list.len()];
        for (name, term) in binding {
            let index = self.index_of(&name)?;
            if index >= values.len() {
                values.resize(index + 1, None);
            }
            values[index] = Some(term.into_term()?);
        }
        values.resize(self.list.len(), None);

        let list = &self.list;
        let variables = self.shared.get_or_insert_with(|| list.as_slice().into());
        Ok((Arc::clone(variables), values).into())
    }
}
