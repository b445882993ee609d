//! Parallelism models a generated program can target.

use serde::{Deserialize, Serialize};

/// Supported parallelism models.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum ParallelismModel {
    /// Single-threaded baseline.
    #[serde(rename = "serial")]
    #[value(name = "serial")]
    Serial,
    /// Shared-memory threading via OpenMP.
    #[serde(rename = "omp")]
    #[value(name = "omp")]
    Omp,
    /// Message passing via MPI.
    #[serde(rename = "mpi")]
    #[value(name = "mpi")]
    Mpi,
    /// Hybrid MPI + OpenMP.
    #[serde(rename = "mpi+omp")]
    #[value(name = "mpi+omp")]
    MpiOmp,
    /// Kokkos performance-portability library.
    #[serde(rename = "kokkos")]
    #[value(name = "kokkos")]
    Kokkos,
    /// NVIDIA CUDA offload.
    #[serde(rename = "cuda")]
    #[value(name = "cuda")]
    Cuda,
    /// AMD HIP offload.
    #[serde(rename = "hip")]
    #[value(name = "hip")]
    Hip,
}

impl ParallelismModel {
    /// Every supported model, in canonical order.
    pub const ALL: [ParallelismModel; 7] = [
        ParallelismModel::Serial,
        ParallelismModel::Omp,
        ParallelismModel::Mpi,
        ParallelismModel::MpiOmp,
        ParallelismModel::Kokkos,
        ParallelismModel::Cuda,
        ParallelismModel::Hip,
    ];

    /// Identifier used in corpus and config documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParallelismModel::Serial => "serial",
            ParallelismModel::Omp => "omp",
            ParallelismModel::Mpi => "mpi",
            ParallelismModel::MpiOmp => "mpi+omp",
            ParallelismModel::Kokkos => "kokkos",
            ParallelismModel::Cuda => "cuda",
            ParallelismModel::Hip => "hip",
        }
    }

    /// Returns true for accelerator offload models.
    pub fn is_gpu(&self) -> bool {
        matches!(self, ParallelismModel::Cuda | ParallelismModel::Hip)
    }
}

impl std::fmt::Display for ParallelismModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParallelismModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParallelismModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Unknown parallelism model: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_str() {
        assert_eq!("mpi+omp".parse::<ParallelismModel>().unwrap(), ParallelismModel::MpiOmp);
        assert_eq!("serial".parse::<ParallelismModel>().unwrap(), ParallelismModel::Serial);
        assert!("openacc".parse::<ParallelismModel>().is_err());
        assert!("OMP".parse::<ParallelismModel>().is_err());
    }

    #[test]
    fn test_model_serde_names() {
        let json = serde_json::to_string(&ParallelismModel::MpiOmp).unwrap();
        assert_eq!(json, "\"mpi+omp\"");
        let back: ParallelismModel = serde_json::from_str("\"kokkos\"").unwrap();
        assert_eq!(back, ParallelismModel::Kokkos);
    }

    #[test]
    fn test_display_round_trips() {
        for model in ParallelismModel::ALL {
            assert_eq!(model.to_string().parse::<ParallelismModel>().unwrap(), model);
        }
    }
}
