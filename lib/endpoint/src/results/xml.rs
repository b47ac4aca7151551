//! A streaming decoder for the [SPARQL Query Results XML Format](https://www.w3.org/TR/rdf-sparql-XMLres/).
//!
//! Elements are matched by their local name. Unknown elements such as `link` are skipped and term
//! values are taken as sent, so relative IRIs returned by an endpoint are kept.

use crate::error::SparqlClientError;
use crate::results::term::{RawTerm, Variables};
use crate::results::{QuerySolution, ResultsDecoder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use std::io::{BufReader, Read};
use std::mem;

/// Decodes `application/sparql-results+xml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlResultsDecoder;

impl ResultsDecoder for XmlResultsDecoder {
    fn decode_solutions(
        &self,
        reader: Box<dyn Read + Send>,
        emit: &mut dyn FnMut(QuerySolution) -> bool,
    ) -> Result<(), SparqlClientError> {
        read_document(reader, Some(emit))?;
        Ok(())
    }

    fn decode_boolean(&self, reader: Box<dyn Read + Send>) -> Result<bool, SparqlClientError> {
        read_document(reader, None)?.ok_or(SparqlClientError::NoAskResponse)
    }
}

fn invalid(error: impl fmt::Display) -> SparqlClientError {
    SparqlClientError::XmlResults(error.to_string())
}

/// Reads a results document and returns its `boolean` value, if any.
///
/// If `on_solution` is set, it is called for each `result` element. Reading stops once it returns
/// `false`.
fn read_document(
    reader: impl Read,
    mut on_solution: Option<&mut dyn FnMut(QuerySolution) -> bool>,
) -> Result<Option<bool>, SparqlClientError> {
    let mut reader = Reader::from_reader(BufReader::new(reader));
    let mut buffer = Vec::new();
    let mut document = Document::default();
    loop {
        let solution = match reader.read_event_into(&mut buffer).map_err(invalid)? {
            Event::Start(element) => {
                document.start(&element)?;
                None
            }
            Event::Empty(element) => {
                document.start(&element)?;
                document.end(element.local_name().as_ref())?
            }
            Event::End(element) => document.end(element.local_name().as_ref())?,
            Event::Text(text) if document.collects_text() => {
                document.text.push_str(&text.unescape().map_err(invalid)?);
                None
            }
            Event::CData(data) if document.collects_text() => {
                document
                    .text
                    .push_str(std::str::from_utf8(&data).map_err(invalid)?);
                None
            }
            Event::Eof => break,
            _ => None,
        };
        buffer.clear();
        if let (Some(solution), Some(on_solution)) = (solution, on_solution.as_deref_mut()) {
            if !on_solution(solution) {
                return Ok(document.boolean);
            }
        }
    }
    if !document.root {
        return Err(invalid("no sparql element found"));
    }
    if document.depth > 0 {
        return Err(invalid("unexpected end of document"));
    }
    Ok(document.boolean)
}

/// A term element whose text has not been read yet.
struct OpenTerm {
    kind: &'static str,
    language: Option<String>,
    datatype: Option<String>,
}

#[derive(Default)]
struct Document {
    root: bool,
    depth: usize,
    variables: Variables,
    binding: Vec<(String, RawTerm)>,
    binding_name: Option<String>,
    term: Option<OpenTerm>,
    in_boolean: bool,
    text: String,
    boolean: Option<bool>,
}

impl Document {
    fn collects_text(&self) -> bool {
        self.term.is_some() || self.in_boolean
    }

    fn start(&mut self, element: &BytesStart<'_>) -> Result<(), SparqlClientError> {
        self.depth += 1;
        match element.local_name().as_ref() {
            b"sparql" => self.root = true,
            b"variable" => {
                if let Some(name) = attribute(element, b"name")? {
                    self.variables.index_of(&name).map_err(invalid)?;
                }
            }
            b"result" => self.binding.clear(),
            b"binding" => {
                self.binding_name = Some(
                    attribute(element, b"name")?
                        .ok_or_else(|| invalid("binding element without a name"))?,
                );
            }
            b"uri" => self.open_term("uri", element)?,
            b"bnode" => self.open_term("bnode", element)?,
            b"literal" => self.open_term("literal", element)?,
            b"triple" if self.binding_name.is_some() => {
                return Err(invalid("Unsupported RDF term type 'triple'"));
            }
            b"boolean" => {
                self.in_boolean = true;
                self.text.clear();
            }
            _ => {}
        }
        Ok(())
    }

    fn open_term(
        &mut self,
        kind: &'static str,
        element: &BytesStart<'_>,
    ) -> Result<(), SparqlClientError> {
        if self.binding_name.is_some() {
            self.term = Some(OpenTerm {
                kind,
                language: attribute(element, b"xml:lang")?,
                datatype: attribute(element, b"datatype")?,
            });
            self.text.clear();
        }
        Ok(())
    }

    /// Closes an element and returns the solution it completes, if any.
    fn end(&mut self, name: &[u8]) -> Result<Option<QuerySolution>, SparqlClientError> {
        self.depth = self.depth.saturating_sub(1);
        match name {
            b"uri" | b"bnode" | b"literal" => {
                if let (Some(term), Some(name)) = (self.term.take(), &self.binding_name) {
                    let value = mem::take(&mut self.text);
                    self.binding.push((
                        name.clone(),
                        RawTerm::new(term.kind, value, term.language, term.datatype),
                    ));
                }
            }
            b"binding" => self.binding_name = None,
            b"result" => {
                let solution = self
                    .variables
                    .solution(self.binding.drain(..))
                    .map_err(invalid)?;
                return Ok(Some(solution));
            }
            b"boolean" => {
                self.in_boolean = false;
                self.boolean = Some(match self.text.trim() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    value => return Err(invalid(format!("invalid boolean value '{value}'"))),
                });
            }
            _ => {}
        }
        Ok(None)
    }
}

/// Returns the unescaped value of the attribute `name` of `element`.
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, SparqlClientError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(invalid)?;
        if attribute.key.as_ref() == name {
            return Ok(Some(attribute.unescape_value().map_err(invalid)?.into_owned()));
        }
    }
    Ok(None)
}
