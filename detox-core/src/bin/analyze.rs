//! One-shot command-line run of the decision pipeline.
//!
//! Prints the `AnalysisResponse` as JSON. Uses the ONNX backends when the
//! `onnx` feature is on and the model files exist, stub backends otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use detox_core::{
    AnalysisRequest, ClassifierHandle, DecisionPipeline, NarrationStore, NarratorHandle,
    PipelineConfig, SilentNarrator, StubClassifier, StubTranscriber, TranscriberHandle,
};

#[derive(Debug)]
struct Args {
    text: Option<String>,
    audio: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    narration_dir: PathBuf,
    threshold: f32,
    silent: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("analyze failed: {e}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        text: None,
        audio: None,
        models_dir: None,
        narration_dir: std::env::temp_dir().join("detox-narration"),
        threshold: PipelineConfig::default().toxicity_threshold,
        silent: false,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().ok_or(format!("missing value for {flag}"));
        match arg.as_str() {
            "--text" => args.text = Some(value("--text")?),
            "--audio" => args.audio = Some(PathBuf::from(value("--audio")?)),
            "--models" => args.models_dir = Some(PathBuf::from(value("--models")?)),
            "--narration-dir" => args.narration_dir = PathBuf::from(value("--narration-dir")?),
            "--threshold" => {
                args.threshold = value("--threshold")?
                    .parse::<f32>()
                    .map_err(|_| "invalid value for --threshold".to_string())?
                    .clamp(0.01, 0.99);
            }
            "--silent" => args.silent = true,
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p detox-core [--features onnx] --bin analyze -- \\
  [--text <text>] [--audio <clip.wav>] [--models <dir>] [--narration-dir <dir>] \\
  [--threshold <0..1>] [--silent]"
                );
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

fn backends(args: &Args, config: &PipelineConfig) -> (TranscriberHandle, ClassifierHandle) {
    #[cfg(feature = "onnx")]
    {
        use detox_core::inference::onnx::{
            models_dir, DEFAULT_CLASSIFIER_MODEL, DEFAULT_TRANSCRIBER_MODEL,
        };
        use detox_core::{
            OnnxClassifier, OnnxClassifierConfig, WhisperConfig, WhisperTranscriber,
        };

        let root = args.models_dir.clone().unwrap_or_else(models_dir);
        let whisper = WhisperConfig::from_dir(&root.join(DEFAULT_TRANSCRIBER_MODEL));
        let classifier =
            OnnxClassifierConfig::from_dir(&root.join(DEFAULT_CLASSIFIER_MODEL), config.max_tokens);

        let transcriber = if whisper.files_present() {
            TranscriberHandle::new(WhisperTranscriber::new(whisper))
        } else {
            eprintln!("whisper model not found under {}; using stub", root.display());
            TranscriberHandle::new(StubTranscriber::new())
        };
        let classifier = if classifier.files_present() {
            ClassifierHandle::new(OnnxClassifier::new(classifier))
        } else {
            eprintln!("classifier model not found under {}; using stub", root.display());
            ClassifierHandle::new(StubClassifier::new())
        };
        (transcriber, classifier)
    }
    #[cfg(not(feature = "onnx"))]
    {
        let _ = (args, config);
        (
            TranscriberHandle::new(StubTranscriber::new()),
            ClassifierHandle::new(StubClassifier::new()),
        )
    }
}

fn narrator(args: &Args) -> Result<NarratorHandle, String> {
    if args.silent {
        return Ok(NarratorHandle::new(SilentNarrator::default()));
    }
    #[cfg(feature = "google-tts")]
    {
        let tts = detox_core::GoogleTranslateTts::new(Default::default())
            .map_err(|e| e.to_string())?;
        Ok(NarratorHandle::new(tts))
    }
    #[cfg(not(feature = "google-tts"))]
    {
        Ok(NarratorHandle::new(SilentNarrator::default()))
    }
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    let config = PipelineConfig {
        toxicity_threshold: args.threshold,
        ..PipelineConfig::default()
    };
    let (transcriber, classifier) = backends(&args, &config);
    let store = Arc::new(NarrationStore::new(&args.narration_dir).map_err(|e| e.to_string())?);
    let pipeline = DecisionPipeline::new(config, transcriber, classifier, narrator(&args)?, store);
    pipeline.warm_up().map_err(|e| e.to_string())?;

    let request = AnalysisRequest {
        text: args.text,
        audio: args.audio,
    };
    let response = pipeline.analyze(&request).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&response).map_err(|e| e.to_string())?;
    println!("{json}");

    if let detox_core::NarrationRef::Ready { id, format } = &response.narration {
        let artifact = pipeline.store().take(*id).map_err(|e| e.to_string())?;
        let out = args
            .narration_dir
            .join(format!("result_voice.{}", format.extension()));
        std::fs::write(&out, artifact.bytes).map_err(|e| e.to_string())?;
        eprintln!("narration written to {}", out.display());
    }
    Ok(())
}
