//! Result state tracking for prompts.
//!
//! Decides whether a prompt still needs to be executed, and implements the
//! overwrite reset that turns executed records back into raw candidates.

use crate::error::InvalidPromptError;

use super::prompt::{CandidateOutput, Outputs, Prompt};

/// What a prompt's `outputs` currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    /// Empty, or every element is raw candidate text.
    NoResults,
    /// Every element is an executed result record.
    HasResults,
}

/// Classifies a prompt's `outputs`.
///
/// Fails when the field is absent, not a list, holds elements that are
/// neither raw text nor result records, or mixes the two kinds.
pub fn classify(prompt: &Prompt) -> Result<ResultState, InvalidPromptError> {
    let items = match &prompt.outputs {
        Outputs::Candidates(items) => items,
        Outputs::Missing => {
            return Err(InvalidPromptError::MissingOutputs {
                prompt: prompt.name.clone(),
            })
        }
        Outputs::Invalid(_) => {
            return Err(InvalidPromptError::NotAList {
                prompt: prompt.name.clone(),
            })
        }
    };

    if let Some(index) = items
        .iter()
        .position(|o| matches!(o, CandidateOutput::Unrecognized(_)))
    {
        return Err(InvalidPromptError::UnrecognizedOutput {
            prompt: prompt.name.clone(),
            index,
        });
    }

    let executed = items
        .iter()
        .filter(|o| matches!(o, CandidateOutput::Executed(_)))
        .count();

    if executed == 0 {
        Ok(ResultState::NoResults)
    } else if executed == items.len() {
        Ok(ResultState::HasResults)
    } else {
        Err(InvalidPromptError::MixedOutputs {
            prompt: prompt.name.clone(),
        })
    }
}

/// Outcome of applying the overwrite policy to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Prompt needs executing; outputs are raw.
    Execute,
    /// Prompt had results which were reset to raw; it needs executing.
    ExecuteAfterReset,
    /// Prompt already has results and overwrite is off.
    Skip,
}

/// Applies the skip/overwrite policy.
///
/// With `overwrite` set, a prompt that has results is reset in place to its
/// raw candidates. Otherwise the prompt is left untouched.
pub fn prepare(prompt: &mut Prompt, overwrite: bool) -> Result<Decision, InvalidPromptError> {
    match classify(prompt)? {
        ResultState::NoResults => Ok(Decision::Execute),
        ResultState::HasResults if overwrite => {
            reset_to_raw(prompt);
            Ok(Decision::ExecuteAfterReset)
        }
        ResultState::HasResults => Ok(Decision::Skip),
    }
}

/// Replaces executed records with the candidate text they retain.
///
/// Must only be called on a prompt classified as [`ResultState::HasResults`];
/// the replacement list is built in full before it is swapped in.
fn reset_to_raw(prompt: &mut Prompt) {
    if let Outputs::Candidates(items) = &prompt.outputs {
        let raw = items
            .iter()
            .map(|o| match o {
                CandidateOutput::Executed(record) => {
                    CandidateOutput::Raw(record.generated_output.clone())
                }
                other => other.clone(),
            })
            .collect();
        prompt.outputs = Outputs::Candidates(raw);
    }
}
