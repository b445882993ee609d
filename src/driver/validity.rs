//! Static checks on candidate source before it is built.
//!
//! A candidate that defines its own `main` would clash with the benchmark
//! harness, and a candidate for a parallel model that never touches the
//! model's API is not a solution for that model.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::ParallelismModel;

fn main_definition() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bint\s+main\s*\(").expect("valid regex"))
}

fn omp_pragma() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\s*pragma\s+omp\b").expect("valid regex"))
}

fn mpi_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bMPI_[A-Z][A-Za-z_]*").expect("valid regex"))
}

fn kokkos_use() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bKokkos::").expect("valid regex"))
}

/// Why a candidate was rejected before building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceIssue {
    /// Defines `main`.
    DefinesMain,
    /// No OpenMP pragma.
    MissingOpenMp,
    /// No MPI call.
    MissingMpi,
    /// No Kokkos usage.
    MissingKokkos,
}

impl std::fmt::Display for SourceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceIssue::DefinesMain => write!(f, "defines main"),
            SourceIssue::MissingOpenMp => write!(f, "no OpenMP pragma"),
            SourceIssue::MissingMpi => write!(f, "no MPI call"),
            SourceIssue::MissingKokkos => write!(f, "no Kokkos usage"),
        }
    }
}

/// Checks a candidate against the target model.
pub fn check_source(source: &str, model: ParallelismModel) -> Result<(), SourceIssue> {
    if main_definition().is_match(source) {
        return Err(SourceIssue::DefinesMain);
    }

    let uses_omp = || omp_pragma().is_match(source);
    let uses_mpi = || mpi_call().is_match(source);

    match model {
        ParallelismModel::Omp if !uses_omp() => Err(SourceIssue::MissingOpenMp),
        ParallelismModel::Mpi if !uses_mpi() => Err(SourceIssue::MissingMpi),
        ParallelismModel::MpiOmp if !uses_mpi() => Err(SourceIssue::MissingMpi),
        ParallelismModel::MpiOmp if !uses_omp() => Err(SourceIssue::MissingOpenMp),
        ParallelismModel::Kokkos if !kokkos_use().is_match(source) => {
            Err(SourceIssue::MissingKokkos)
        }
        _ => Ok(()),
    }
}
