//! A streaming decoder for the [SPARQL Query Results JSON Format](https://www.w3.org/TR/sparql11-results-json/).
//!
//! Solutions are emitted while the `bindings` array is read. A document without `results` or
//! without `bindings` has no solutions.

use crate::error::SparqlClientError;
use crate::results::term::{RawTerm, Variables};
use crate::results::{QuerySolution, ResultsDecoder};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufReader, Read};

/// Decodes `application/sparql-results+json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonResultsDecoder;

impl ResultsDecoder for JsonResultsDecoder {
    fn decode_solutions(
        &self,
        reader: Box<dyn Read + Send>,
        emit: &mut dyn FnMut(QuerySolution) -> bool,
    ) -> Result<(), SparqlClientError> {
        read_document(reader, Some(emit))?;
        Ok(())
    }

    fn decode_boolean(&self, reader: Box<dyn Read + Send>) -> Result<bool, SparqlClientError> {
        read_document::<dyn FnMut(QuerySolution) -> bool>(reader, None)?
            .ok_or(SparqlClientError::NoAskResponse)
    }
}

/// Reads a whole results document and returns its `boolean` value, if any.
///
/// If `on_solution` is set, it is called for each solution. Reading stops with an error once it
/// returns `false`.
fn read_document<F>(
    reader: impl Read,
    on_solution: Option<&mut F>,
) -> Result<Option<bool>, serde_json::Error>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(reader));
    let boolean = DocumentSeed { on_solution }.deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(boolean)
}

#[derive(Deserialize)]
struct JsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

const CONSUMER_GONE: &str = "the solution stream has been dropped";

struct DocumentSeed<'a, F: ?Sized> {
    on_solution: Option<&'a mut F>,
}

impl<'de, F> DeserializeSeed<'de> for DocumentSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = Option<bool>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for DocumentSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = Option<bool>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a SPARQL JSON results object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut on_solution = self.on_solution;
        let mut variables = Variables::default();
        let mut boolean = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "head" => {
                    for name in map.next_value::<JsonHead>()?.vars {
                        variables.index_of(&name).map_err(de::Error::custom)?;
                    }
                }
                "results" => match on_solution.as_deref_mut() {
                    Some(on_solution) => map.next_value_seed(ResultsSeed {
                        variables: &mut variables,
                        on_solution,
                    })?,
                    None => {
                        map.next_value::<IgnoredAny>()?;
                    }
                },
                "boolean" => boolean = Some(map.next_value::<bool>()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(boolean)
    }
}

struct ResultsSeed<'a, F: ?Sized> {
    variables: &'a mut Variables,
    on_solution: &'a mut F,
}

impl<'de, F> DeserializeSeed<'de> for ResultsSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for ResultsSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a SPARQL JSON results object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let Self {
            variables,
            on_solution,
        } = self;
        while let Some(key) = map.next_key::<String>()? {
            if key == "bindings" {
                map.next_value_seed(BindingsSeed {
                    variables: &mut *variables,
                    on_solution: &mut *on_solution,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct BindingsSeed<'a, F: ?Sized> {
    variables: &'a mut Variables,
    on_solution: &'a mut F,
}

impl<'de, F> DeserializeSeed<'de> for BindingsSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for BindingsSeed<'_, F>
where
    F: FnMut(QuerySolution) -> bool + ?Sized,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of SPARQL JSON bindings")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(binding) = seq.next_element::<BTreeMap<String, RawTerm>>()? {
            let solution = self.variables.solution(binding).map_err(de::Error::custom)?;
            if !(self.on_solution)(solution) {
                return Err(de::Error::custom(CONSUMER_GONE));
            }
        }
        Ok(())
    }
}
