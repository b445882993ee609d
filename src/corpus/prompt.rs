//! Prompt records and their candidate outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Key of the language field.
const LANGUAGE: &str = "language";

/// Key of the problem type field.
const PROBLEM_TYPE: &str = "problem_type";

/// Key of the prompt text field.
const PROMPT: &str = "prompt";

/// One benchmark case: a generation task plus its candidate outputs.
///
/// Only the fields every prompt needs for filtering are typed. The rest,
/// including `language`, `problem_type` and `prompt`, stay as raw JSON in
/// [`Prompt::extra`] and are read on demand, so a prompt that is never
/// selected is written back exactly as it was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique identifier within the corpus.
    pub name: String,
    /// Parallelism model identifier (see [`crate::model::ParallelismModel`]).
    ///
    /// Kept as a string so that prompts for models this harness does not
    /// know about still load and round-trip; they are simply never selected.
    pub parallelism_model: String,
    /// Candidate outputs, raw or executed.
    #[serde(default, skip_serializing_if = "Outputs::is_missing")]
    pub outputs: Outputs,
    /// Every other field in the record, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Prompt {
    /// Creates a prompt with no candidates.
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        parallelism_model: impl Into<String>,
    ) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert(LANGUAGE.to_string(), Value::String(language.into()));
        Self {
            name: name.into(),
            parallelism_model: parallelism_model.into(),
            outputs: Outputs::Candidates(Vec::new()),
            extra,
        }
    }

    /// Sets the problem type.
    pub fn with_problem_type(mut self, problem_type: impl Into<String>) -> Self {
        self.extra.insert(PROBLEM_TYPE.to_string(), Value::String(problem_type.into()));
        self
    }

    /// Sets the prompt text.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.extra.insert(PROMPT.to_string(), Value::String(prompt.into()));
        self
    }

    /// Appends a raw candidate.
    pub fn with_candidate(mut self, text: impl Into<String>) -> Self {
        let candidate = CandidateOutput::Raw(text.into());
        match &mut self.outputs {
            Outputs::Candidates(items) => items.push(candidate),
            other => *other = Outputs::Candidates(vec![candidate]),
        }
        self
    }

    /// Language of the generated code; selects the driver. `None` when the
    /// field is absent or not a string.
    pub fn language(&self) -> Option<&str> {
        self.text_field(LANGUAGE)
    }

    /// Free-form classification tag.
    pub fn problem_type(&self) -> Option<&str> {
        self.text_field(PROBLEM_TYPE)
    }

    /// Prompt text the model completed.
    pub fn prompt_text(&self) -> Option<&str> {
        self.text_field(PROMPT)
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Raw candidate texts, in order. Executed and unrecognized entries are
    /// not included.
    pub fn raw_candidates(&self) -> Vec<&str> {
        match &self.outputs {
            Outputs::Candidates(items) => items
                .iter()
                .filter_map(|o| match o {
                    CandidateOutput::Raw(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// The `outputs` field of a prompt.
///
/// Loading never fails on a malformed `outputs`; the shape is checked only
/// when a prompt is actually selected for execution, and anything that
/// could not be interpreted is written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Outputs {
    /// Field absent from the record.
    #[default]
    Missing,
    /// A list of candidates.
    Candidates(Vec<CandidateOutput>),
    /// Present but not a list.
    Invalid(Value),
}

impl Outputs {
    /// Returns true when the field was absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, Outputs::Missing)
    }
}

impl<'de> Deserialize<'de> for Outputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => {
                Outputs::Candidates(items.into_iter().map(CandidateOutput::from_value).collect())
            }
            other => Outputs::Invalid(other),
        })
    }
}

/// One element of a prompt's `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CandidateOutput {
    /// Generated text that has not been executed yet.
    Raw(String),
    /// Result of building and running a candidate.
    Executed(ResultRecord),
    /// Neither a string nor a result record.
    Unrecognized(Value),
}

impl CandidateOutput {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => CandidateOutput::Raw(text),
            Value::Object(map) if matches!(map.get("generated_output"), Some(Value::String(_))) => {
                match serde_json::from_value(Value::Object(map.clone())) {
                    Ok(record) => CandidateOutput::Executed(record),
                    Err(_) => CandidateOutput::Unrecognized(Value::Object(map)),
                }
            }
            other => CandidateOutput::Unrecognized(other),
        }
    }
}

impl<'de> Deserialize<'de> for CandidateOutput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(CandidateOutput::from_value)
    }
}

/// Persisted outcome of executing one candidate.
///
/// The schema beyond `generated_output` belongs to the driver that produced
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The candidate text this record was produced from.
    pub generated_output: String,
    /// Driver-defined fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ResultRecord {
    /// Creates a record with no driver fields.
    pub fn new(generated_output: impl Into<String>) -> Self {
        Self {
            generated_output: generated_output.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a driver field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_raw_and_executed() {
        let prompt: Prompt = serde_json::from_value(json!({
            "name": "A",
            "language": "cpp",
            "parallelism_model": "serial",
            "outputs": ["code1", {"generated_output": "code2", "did_build": true}],
        }))
        .unwrap();

        let Outputs::Candidates(items) = &prompt.outputs else {
            panic!("expected candidates");
        };
        assert_eq!(items[0], CandidateOutput::Raw("code1".into()));
        match &items[1] {
            CandidateOutput::Executed(record) => {
                assert_eq!(record.generated_output, "code2");
                assert_eq!(record.fields.get("did_build"), Some(&json!(true)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_outputs_still_load() {
        let prompt: Prompt = serde_json::from_value(json!({
            "name": "A",
            "language": "cpp",
            "parallelism_model": "serial",
            "outputs": {"not": "a list"},
        }))
        .unwrap();
        assert_eq!(prompt.outputs, Outputs::Invalid(json!({"not": "a list"})));

        let missing: Prompt = serde_json::from_value(json!({
            "name": "B",
            "language": "cpp",
            "parallelism_model": "serial",
        }))
        .unwrap();
        assert!(missing.outputs.is_missing());
    }

    #[test]
    fn test_record_without_generated_output_is_unrecognized() {
        let output: CandidateOutput = serde_json::from_value(json!({"did_build": false})).unwrap();
        assert!(matches!(output, CandidateOutput::Unrecognized(_)));

        let number: CandidateOutput = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(number, CandidateOutput::Unrecognized(json!(3)));
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let input = json!({
            "name": "A",
            "language": "cpp",
            "parallelism_model": "omp",
            "problem_type": "fft",
            "temperature": 0.2,
            "outputs": [{"generated_output": "x", "runs": []}, 7],
        });
        let prompt: Prompt = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(prompt.extra.get("temperature"), Some(&json!(0.2)));
        assert_eq!(serde_json::to_value(&prompt).unwrap(), input);
    }

    #[test]
    fn test_null_and_missing_fields_round_trip() {
        let input = json!({
            "name": "A",
            "parallelism_model": "serial",
            "language": "cpp",
            "problem_type": null,
            "prompt": null,
            "outputs": [],
        });
        let prompt: Prompt = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(prompt.language(), Some("cpp"));
        assert_eq!(prompt.problem_type(), None);
        assert_eq!(prompt.prompt_text(), None);
        assert_eq!(serde_json::to_value(&prompt).unwrap(), input);

        let no_language = json!({"name": "B", "parallelism_model": "omp", "outputs": ["x"]});
        let prompt: Prompt = serde_json::from_value(no_language.clone()).unwrap();
        assert_eq!(prompt.language(), None);
        assert_eq!(serde_json::to_value(&prompt).unwrap(), no_language);
    }

    #[test]
    fn test_non_string_language_is_kept_but_not_read() {
        let input = json!({"name": "C", "parallelism_model": "hip", "language": 7});
        let prompt: Prompt = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(prompt.language(), None);
        assert_eq!(serde_json::to_value(&prompt).unwrap(), input);
    }

    #[test]
    fn test_missing_outputs_not_serialized() {
        let mut prompt = Prompt::new("A", "cpp", "serial");
        prompt.outputs = Outputs::Missing;
        let value = serde_json::to_value(&prompt).unwrap();
        assert!(value.get("outputs").is_none());
    }

    #[test]
    fn test_builder_candidates() {
        let prompt = Prompt::new("A", "cpp", "serial")
            .with_problem_type("fft")
            .with_prompt("int f() {")
            .with_candidate("code1")
            .with_candidate("code2");
        assert_eq!(prompt.raw_candidates(), vec!["code1", "code2"]);
        assert_eq!(prompt.language(), Some("cpp"));
        assert_eq!(prompt.problem_type(), Some("fft"));
        assert_eq!(prompt.prompt_text(), Some("int f() {"));
    }
}
