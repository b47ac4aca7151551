use crate::error::SparqlClientError;
use oxrdf::{Quad, Triple};
use oxrdfio::{RdfFormat, RdfParser};
use std::io::{BufReader, Read};
use tracing::debug;

/// Decodes an RDF serialization and hands its triples to `emit` in document order.
///
/// Relative IRIs are resolved against `base_iri` if it is a valid IRI. Quads of named graphs are
/// returned as triples without their graph name. Decoding stops early once `emit` returns `false`.
pub(crate) fn decode_triples(
    reader: Box<dyn Read + Send>,
    format: RdfFormat,
    base_iri: &str,
    emit: &mut dyn FnMut(Triple) -> bool,
) -> Result<(), SparqlClientError> {
    let parser = RdfParser::from_format(format)
        .with_base_iri(base_iri)
        .unwrap_or_else(|error| {
            debug!("Not resolving relative IRIs against {base_iri}: {error}");
            RdfParser::from_format(format)
        });

    let mut named_graph_quads = 0;
    for quad in parser.for_reader(BufReader::new(reader)) {
        if !emit(flatten(quad?, &mut named_graph_quads)) {
            break;
        }
    }
    if named_graph_quads > 0 {
        debug!(named_graph_quads, "Dropped the graph names of quads in named graphs");
    }
    Ok(())
}

/// Turns `quad` into a triple, counting the quads of named graphs in `named_graph_quads`.
fn flatten(quad: Quad, named_graph_quads: &mut usize) -> Triple {
    if !quad.graph_name.is_default_graph() {
        if *named_graph_quads == 0 {
            debug!(graph_name = %quad.graph_name, "Dropping the graph name of a quad");
        }
        *named_graph_quads += 1;
    }
    Triple::new(quad.subject, quad.predicate, quad.object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{GraphName, Literal, NamedNode};
    use std::io::Cursor;

    fn triples(
        data: &'static str,
        format: RdfFormat,
        base_iri: &str,
    ) -> Result<Vec<Triple>, SparqlClientError> {
        let mut triples = Vec::new();
        decode_triples(Box::new(Cursor::new(data)), format, base_iri, &mut |t| {
            triples.push(t);
            true
        })?;
        Ok(triples)
    }

    #[test]
    fn test_turtle() {
        let triples = triples(
            "@prefix ex: <http://ex.org/> .\nex:s ex:p ex:o1, \"o2\" .",
            RdfFormat::Turtle,
            "http://ex.org/sparql",
        )
        .unwrap();
        let s = NamedNode::new_unchecked("http://ex.org/s");
        let p = NamedNode::new_unchecked("http://ex.org/p");
        assert_eq!(
            triples,
            vec![
                Triple::new(
                    s.clone(),
                    p.clone(),
                    NamedNode::new_unchecked("http://ex.org/o1")
                ),
                Triple::new(s, p, Literal::new_simple_literal("o2")),
            ]
        );
    }

    #[test]
    fn test_relative_iris_use_base() {
        let triples = triples(
            "<s> <p> <o> .",
            RdfFormat::Turtle,
            "http://ex.org/sparql",
        )
        .unwrap();
        assert_eq!(
            triples[0].subject,
            NamedNode::new_unchecked("http://ex.org/s").into()
        );
    }

    #[test]
    fn test_invalid_base_is_ignored() {
        let triples = triples(
            "<http://ex.org/s> <http://ex.org/p> <http://ex.org/o> .",
            RdfFormat::NTriples,
            "not an iri",
        )
        .unwrap();
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_named_graphs_are_flattened() {
        let triples = triples(
            "<http://ex.org/s> <http://ex.org/p> \"a\" <http://ex.org/g> .\n\
             <http://ex.org/s> <http://ex.org/p> \"b\" .",
            RdfFormat::NQuads,
            "",
        )
        .unwrap();
        let s = NamedNode::new_unchecked("http://ex.org/s");
        let p = NamedNode::new_unchecked("http://ex.org/p");
        assert_eq!(
            triples,
            vec![
                Triple::new(s.clone(), p.clone(), Literal::new_simple_literal("a")),
                Triple::new(s, p, Literal::new_simple_literal("b")),
            ]
        );
    }

    #[test]
    fn test_flatten_counts_named_graph_quads() {
        let s = NamedNode::new_unchecked("http://ex.org/s");
        let p = NamedNode::new_unchecked("http://ex.org/p");
        let o = Literal::new_simple_literal("o");
        let mut named_graph_quads = 0;
        let triple = flatten(
            Quad::new(
                s.clone(),
                p.clone(),
                o.clone(),
                NamedNode::new_unchecked("http://ex.org/g"),
            ),
            &mut named_graph_quads,
        );
        assert_eq!(triple, Triple::new(s.clone(), p.clone(), o.clone()));
        flatten(
            Quad::new(s, p, o, GraphName::DefaultGraph),
            &mut named_graph_quads,
        );
        assert_eq!(named_graph_quads, 1);
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            triples("<http://ex.org/s> <http://ex.org/p> .", RdfFormat::Turtle, ""),
            Err(SparqlClientError::RdfParsing(_))
        ));
    }

    #[test]
    fn test_stop_early() {
        let mut count = 0;
        decode_triples(
            Box::new(Cursor::new("<http://a> <http://b> <http://c>, <http://d> .")),
            RdfFormat::Turtle,
            "",
            &mut |_| {
                count += 1;
                false
            },
        )
        .unwrap();
        assert_eq!(count, 1);
    }
}
