//! Integration tests for the orchestration loop.
//!
//! A recording driver stands in for real compilers so these tests exercise
//! filtering, skip/overwrite decisions, and persistence end to end.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use codegen_harness::config::RunOptions;
use codegen_harness::corpus::{
    classify, CandidateOutput, Corpus, Outputs, Prompt, ResultRecord, ResultState,
};
use codegen_harness::driver::{Driver, DriverConfig, DriverError, DriverRegistry};
use codegen_harness::filter::{ProblemSelector, PromptFilter};
use codegen_harness::model::ParallelismModel;
use codegen_harness::orchestrator::Orchestrator;
use codegen_harness::persistence::{Destination, ResultWriter};
use codegen_harness::HarnessError;

/// Every candidate a driver was asked to run: (prompt name, candidate).
type CallLog = Arc<Mutex<Vec<(String, String)>>>;

struct RecordingDriver {
    config: DriverConfig,
    calls: CallLog,
    fail_on: Option<String>,
}

#[async_trait]
impl Driver for RecordingDriver {
    fn language(&self) -> &str {
        "cpp"
    }

    async fn test_output(
        &self,
        prompt: &Prompt,
        candidate: &str,
    ) -> Result<ResultRecord, DriverError> {
        if self.fail_on.as_deref() == Some(prompt.name.as_str()) {
            return Err(DriverError::MissingLaunchConfig(self.config.parallelism_model));
        }
        self.calls
            .lock()
            .unwrap()
            .push((prompt.name.clone(), candidate.to_string()));
        Ok(ResultRecord::new(candidate)
            .with_field("did_build", !self.config.dry_run)
            .with_field("model", self.config.parallelism_model.as_str()))
    }
}

/// Driver that ignores its prompt entirely.
struct LazyDriver;

#[async_trait]
impl Driver for LazyDriver {
    fn language(&self) -> &str {
        "cpp"
    }

    async fn test_output(&self, _: &Prompt, candidate: &str) -> Result<ResultRecord, DriverError> {
        Ok(ResultRecord::new(candidate))
    }

    async fn test_all_outputs(&self, _prompt: &mut Prompt) -> Result<usize, DriverError> {
        Ok(3)
    }
}

fn registry(calls: &CallLog, fail_on: Option<&str>) -> DriverRegistry {
    let calls = Arc::clone(calls);
    let fail_on = fail_on.map(str::to_string);
    let mut registry = DriverRegistry::new();
    registry.register(
        "cpp",
        Box::new(move |config: DriverConfig| {
            Box::new(RecordingDriver {
                config,
                calls: Arc::clone(&calls),
                fail_on: fail_on.clone(),
            }) as Box<dyn Driver>
        }),
    );
    registry
}

fn orchestrator(calls: &CallLog, options: RunOptions, output: &Path) -> Orchestrator {
    Orchestrator::new(
        registry(calls, None),
        options,
        ResultWriter::new(Destination::File(output.to_path_buf())),
    )
}

fn include(models: &[ParallelismModel]) -> PromptFilter {
    PromptFilter::from_lists(Some(models), None).unwrap()
}

fn scenario_corpus() -> Corpus {
    Corpus::new(vec![Prompt::new("A", "cpp", "serial")
        .with_candidate("code1")
        .with_candidate("code2")])
}

fn records(prompt: &Prompt) -> Vec<&ResultRecord> {
    match &prompt.outputs {
        Outputs::Candidates(items) => items
            .iter()
            .map(|o| match o {
                CandidateOutput::Executed(record) => record,
                other => panic!("expected executed record, got {:?}", other),
            })
            .collect(),
        other => panic!("expected candidates, got {:?}", other),
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_run_skip_then_overwrite_scenario() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let calls: CallLog = Arc::default();
    let options = RunOptions::new().with_filter(include(&[ParallelismModel::Serial]));

    // First run executes both candidates.
    let mut corpus = scenario_corpus();
    let summary = orchestrator(&calls, options.clone(), &output)
        .run(&mut corpus)
        .await
        .unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.candidates, 2);

    let first = records(&corpus.prompts()[0]);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].generated_output, "code1");
    assert_eq!(first[1].generated_output, "code2");
    assert_eq!(first[0].fields["model"], json!("serial"));

    let persisted = read_json(&output);
    assert_eq!(persisted[0]["outputs"][1]["generated_output"], json!("code2"));

    // Second run without overwrite leaves everything as it was.
    let mut reloaded = Corpus::load(&output).unwrap();
    let before = reloaded.clone();
    calls.lock().unwrap().clear();
    let summary = orchestrator(&calls, options.clone(), &output)
        .run(&mut reloaded)
        .await
        .unwrap();
    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.executed, 0);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(reloaded, before);

    // Third run with overwrite resets to raw text and re-executes.
    let summary = orchestrator(&calls, options.with_overwrite(true), &output)
        .run(&mut reloaded)
        .await
        .unwrap();
    assert_eq!(summary.overwritten, 1);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            ("A".to_string(), "code1".to_string()),
            ("A".to_string(), "code2".to_string()),
        ]
    );
    assert_eq!(classify(&reloaded.prompts()[0]), Ok(ResultState::HasResults));
}

#[tokio::test]
async fn test_model_filters() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let corpus = Corpus::new(
        ["serial", "omp", "mpi", "cuda", "openacc"]
            .iter()
            .map(|m| Prompt::new(format!("p-{}", m), "cpp", *m).with_candidate("x"))
            .collect(),
    );

    let calls: CallLog = Arc::default();
    let mut included = corpus.clone();
    let options =
        RunOptions::new().with_filter(include(&[ParallelismModel::Omp, ParallelismModel::Mpi]));
    let summary = orchestrator(&calls, options, &output)
        .run(&mut included)
        .await
        .unwrap();
    let names: Vec<String> = calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(names, vec!["p-omp", "p-mpi"]);
    assert_eq!(summary.filtered_by_model, 3);
    // Filtered prompts are untouched.
    assert_eq!(included.prompts()[0], corpus.prompts()[0]);

    let calls: CallLog = Arc::default();
    let mut excluded = corpus.clone();
    let filter = PromptFilter::from_lists(None, Some(&[ParallelismModel::Cuda])).unwrap();
    orchestrator(&calls, RunOptions::new().with_filter(filter), &output)
        .run(&mut excluded)
        .await
        .unwrap();
    let names: Vec<String> = calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(names, vec!["p-serial", "p-omp", "p-mpi"]);
}

#[tokio::test]
async fn test_problem_filters() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let corpus = Corpus::new(vec![
        Prompt::new("07_fft_fft_conjugate", "cpp", "omp")
            .with_problem_type("fft")
            .with_candidate("a"),
        Prompt::new("03_dense_la_axpy", "cpp", "omp")
            .with_problem_type("dense_la")
            .with_candidate("b"),
    ]);

    let calls: CallLog = Arc::default();
    let filter =
        PromptFilter::default().with_problem(ProblemSelector::ProblemType("dense_la".into()));
    let summary = orchestrator(&calls, RunOptions::new().with_filter(filter), &output)
        .run(&mut corpus.clone())
        .await
        .unwrap();
    assert_eq!(summary.filtered_by_problem_type, 1);
    assert_eq!(calls.lock().unwrap()[0].0, "03_dense_la_axpy");

    let calls: CallLog = Arc::default();
    let filter =
        PromptFilter::default().with_problem(ProblemSelector::Name("07_fft_fft_conjugate".into()));
    let summary = orchestrator(&calls, RunOptions::new().with_filter(filter), &output)
        .run(&mut corpus.clone())
        .await
        .unwrap();
    assert_eq!(summary.filtered_by_name, 1);
    assert_eq!(calls.lock().unwrap()[0].0, "07_fft_fft_conjugate");
}

#[tokio::test]
async fn test_crash_leaves_earlier_results_on_disk() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let calls: CallLog = Arc::default();
    let mut corpus = Corpus::new(
        (1..=4)
            .map(|i| {
                Prompt::new(format!("p{}", i), "cpp", "serial")
                    .with_candidate(format!("code{}", i))
            })
            .collect(),
    );

    let orchestrator = Orchestrator::new(
        registry(&calls, Some("p3")),
        RunOptions::new(),
        ResultWriter::new(Destination::File(output.clone())),
    );
    let err = orchestrator.run(&mut corpus).await.unwrap_err();
    assert!(matches!(err, HarnessError::Driver { ref prompt, .. } if prompt == "p3"));

    let persisted = Corpus::load(&output).unwrap();
    assert_eq!(persisted.len(), 4);
    for prompt in &persisted.prompts()[..2] {
        assert_eq!(classify(prompt), Ok(ResultState::HasResults));
    }
    for (i, prompt) in persisted.prompts()[2..].iter().enumerate() {
        assert_eq!(prompt.raw_candidates(), vec![format!("code{}", i + 3)]);
    }

    // Resuming skips the finished prompts and completes the rest.
    let calls: CallLog = Arc::default();
    let mut resumed = persisted;
    let summary = Orchestrator::new(
        registry(&calls, None),
        RunOptions::new(),
        ResultWriter::new(Destination::File(output.clone())),
    )
    .run(&mut resumed)
    .await
    .unwrap();
    assert_eq!(summary.skipped_existing, 2);
    assert_eq!(summary.executed, 2);
    for prompt in resumed.prompts() {
        assert_eq!(classify(prompt), Ok(ResultState::HasResults));
    }
}

#[tokio::test]
async fn test_invalid_prompt_aborts_after_flushing_earlier_prompts() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let calls: CallLog = Arc::default();

    let mut mixed = Prompt::new("bad", "cpp", "serial").with_candidate("raw");
    if let Outputs::Candidates(items) = &mut mixed.outputs {
        items.push(CandidateOutput::Executed(ResultRecord::new("done")));
    }
    let mut corpus = Corpus::new(vec![
        Prompt::new("good", "cpp", "serial").with_candidate("x"),
        mixed,
        Prompt::new("never", "cpp", "serial").with_candidate("y"),
    ]);

    let err = orchestrator(&calls, RunOptions::new(), &output)
        .run(&mut corpus)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::InvalidPrompt(_)));
    assert_eq!(calls.lock().unwrap().len(), 1);

    let persisted = Corpus::load(&output).unwrap();
    assert_eq!(classify(&persisted.prompts()[0]), Ok(ResultState::HasResults));
    assert_eq!(persisted.prompts()[2].raw_candidates(), vec!["y"]);
}

#[tokio::test]
async fn test_unknown_language_aborts_before_later_prompts() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let calls: CallLog = Arc::default();
    let mut corpus = Corpus::new(vec![
        Prompt::new("a", "cpp", "serial").with_candidate("x"),
        Prompt::new("b", "fortran", "serial").with_candidate("y"),
        Prompt::new("c", "cpp", "serial").with_candidate("z"),
    ]);

    let err = orchestrator(&calls, RunOptions::new(), &output)
        .run(&mut corpus)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::UnknownLanguage { ref language, .. } if language == "fortran"
    ));
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(corpus.prompts()[2].raw_candidates(), vec!["z"]);
}

#[tokio::test]
async fn test_stdout_destination_writes_only_at_finish() {
    let temp = TempDir::new().unwrap();
    let calls: CallLog = Arc::default();
    let orchestrator = Orchestrator::new(
        registry(&calls, None),
        RunOptions::new().with_dry_run(true).with_scratch_dir(temp.path()),
        ResultWriter::new(Destination::Stdout),
    );

    let mut corpus = scenario_corpus();
    orchestrator.run(&mut corpus).await.unwrap();
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

    let mut stdout = Vec::new();
    orchestrator.finish(&corpus, &mut stdout).unwrap();
    let printed: Value = serde_json::from_slice(&stdout).unwrap();
    assert_eq!(printed[0]["outputs"][0]["generated_output"], json!("code1"));
    assert_eq!(printed[0]["outputs"][0]["did_build"], json!(false));
}

#[tokio::test]
async fn test_driver_that_skips_outputs_violates_contract() {
    let temp = TempDir::new().unwrap();
    let mut registry = DriverRegistry::new();
    registry.register(
        "cpp",
        Box::new(|_config: DriverConfig| Box::new(LazyDriver) as Box<dyn Driver>),
    );
    let orchestrator = Orchestrator::new(
        registry,
        RunOptions::new(),
        ResultWriter::new(Destination::File(temp.path().join("results.json"))),
    );

    let mut corpus = scenario_corpus();
    let err = orchestrator.run(&mut corpus).await.unwrap_err();
    assert!(matches!(err, HarnessError::DriverContract { .. }));
}

#[tokio::test]
async fn test_prompt_without_candidates_is_executed_and_stays_empty() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("results.json");
    let calls: CallLog = Arc::default();
    let mut corpus = Corpus::new(vec![Prompt::new("empty", "cpp", "hip")]);

    let summary = orchestrator(&calls, RunOptions::new(), &output)
        .run(&mut corpus)
        .await
        .unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.candidates, 0);
    assert_eq!(read_json(&output)[0]["outputs"], json!([]));
}

#[tokio::test]
async fn test_unselected_prompts_round_trip_verbatim() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("prompts.json");
    let output = temp.path().join("results.json");
    let omp_without_language = json!({
        "name": "B",
        "parallelism_model": "omp",
        "problem_type": null,
        "prompt": null,
        "outputs": ["y"],
    });
    fs::write(
        &input,
        json!([
            {"name": "A", "language": "cpp", "parallelism_model": "serial", "outputs": ["x"]},
            omp_without_language.clone(),
        ])
        .to_string(),
    )
    .unwrap();

    let calls: CallLog = Arc::default();
    let mut corpus = Corpus::load(&input).unwrap();
    let serial_only = RunOptions::new().with_filter(include(&[ParallelismModel::Serial]));
    orchestrator(&calls, serial_only, &output)
        .run(&mut corpus)
        .await
        .unwrap();
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(read_json(&output)[1], omp_without_language);

    // Selecting the prompt without a language is what fails.
    let omp_only = RunOptions::new().with_filter(include(&[ParallelismModel::Omp]));
    let err = orchestrator(&calls, omp_only, &output)
        .run(&mut corpus)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::MissingLanguage(ref name) if name == "B"));
}
