//! Prompt selection by parallelism model, problem name, and problem type.

use std::collections::BTreeSet;

use crate::corpus::Prompt;
use crate::error::{HarnessError, Result};
use crate::model::ParallelismModel;

/// Why a prompt was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Model not in the effective set (or not a known model).
    Model,
    /// Name differs from the single-problem filter.
    Name,
    /// Problem type differs from the problem-type filter.
    ProblemType,
}

/// Narrowing applied on top of the model set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProblemSelector {
    /// Every problem.
    #[default]
    All,
    /// Only the prompt with this name.
    Name(String),
    /// Only prompts with this problem type.
    ProblemType(String),
}

/// Decides which prompts take part in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFilter {
    models: BTreeSet<ParallelismModel>,
    problem: ProblemSelector,
}

impl PromptFilter {
    /// Builds a filter from an allow-list or a deny-list of models.
    ///
    /// Supplying both is a configuration error. With neither, every
    /// supported model is tested.
    pub fn from_lists(
        include: Option<&[ParallelismModel]>,
        exclude: Option<&[ParallelismModel]>,
    ) -> Result<Self> {
        let models = match (include, exclude) {
            (Some(_), Some(_)) => {
                return Err(HarnessError::ConflictingOptions(
                    "--include-models and --exclude-models cannot be used together".to_string(),
                ))
            }
            (Some(include), None) => include.iter().copied().collect(),
            (None, Some(exclude)) => ParallelismModel::ALL
                .into_iter()
                .filter(|m| !exclude.contains(m))
                .collect(),
            (None, None) => ParallelismModel::ALL.into_iter().collect(),
        };
        Ok(Self {
            models,
            problem: ProblemSelector::All,
        })
    }

    /// Restricts to a single problem name or problem type.
    pub fn with_problem(mut self, problem: ProblemSelector) -> Self {
        self.problem = problem;
        self
    }

    /// Models that will be tested.
    pub fn models(&self) -> &BTreeSet<ParallelismModel> {
        &self.models
    }

    /// Checks a prompt, returning its model if selected or the first
    /// reason it is rejected.
    pub fn check(&self, prompt: &Prompt) -> std::result::Result<ParallelismModel, Rejection> {
        let model = prompt
            .parallelism_model
            .parse::<ParallelismModel>()
            .ok()
            .filter(|m| self.models.contains(m))
            .ok_or(Rejection::Model)?;

        match &self.problem {
            ProblemSelector::Name(name) if prompt.name != *name => Err(Rejection::Name),
            ProblemSelector::ProblemType(tag) if prompt.problem_type() != Some(tag.as_str()) => {
                Err(Rejection::ProblemType)
            }
            _ => Ok(model),
        }
    }
}

impl Default for PromptFilter {
    fn default() -> Self {
        Self {
            models: ParallelismModel::ALL.into_iter().collect(),
            problem: ProblemSelector::All,
        }
    }
}
