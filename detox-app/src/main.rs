//! Detox host entry point: load settings, build the pipeline, serve the UI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use detox_core::{
    inference::onnx::{
        models_dir, OnnxClassifier, OnnxClassifierConfig, WhisperConfig, WhisperTranscriber,
    },
    ClassifierHandle, DecisionPipeline, GoogleTranslateTts, GoogleTtsConfig, NarrationStore,
    NarratorHandle, PipelineConfig, SilentNarrator, StubClassifier, StubTranscriber,
    TranscriberHandle,
};
use detox_app::{
    build_router,
    settings::{
        apply_runtime_env_from_settings, load_settings, save_settings, settings_path, AppSettings,
    },
    AppState,
};
use tracing::{info, warn};

/// How often expired narration artifacts are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn build_transcriber(settings: &AppSettings) -> TranscriberHandle {
    let cfg = WhisperConfig::from_dir(&models_dir().join(&settings.transcriber_model));
    if cfg.files_present() {
        info!("loading Whisper from {:?}", cfg.encoder_path.parent());
        TranscriberHandle::new(WhisperTranscriber::new(cfg))
    } else {
        warn!(
            "Whisper model files not found at {:?} — using StubTranscriber",
            cfg.encoder_path.parent()
        );
        TranscriberHandle::new(StubTranscriber::new())
    }
}

fn build_classifier(settings: &AppSettings, config: &PipelineConfig) -> ClassifierHandle {
    let cfg = OnnxClassifierConfig::from_dir(
        &models_dir().join(&settings.classifier_model),
        config.max_tokens,
    );
    if cfg.files_present() {
        info!("loading toxicity classifier from {:?}", cfg.model_path.parent());
        ClassifierHandle::new(OnnxClassifier::new(cfg))
    } else {
        warn!(
            "classifier model files not found at {:?} — using StubClassifier",
            cfg.model_path.parent()
        );
        ClassifierHandle::new(StubClassifier::new())
    }
}

fn build_narrator(settings: &AppSettings) -> anyhow::Result<NarratorHandle> {
    if settings.narration_backend == "silent" {
        return Ok(NarratorHandle::new(SilentNarrator::default()));
    }
    let tts = GoogleTranslateTts::new(GoogleTtsConfig {
        lang: settings.narration_lang.clone(),
        tld: settings.narration_tld.clone(),
        timeout: Duration::from_secs(settings.narration_timeout_secs),
    })?;
    Ok(NarratorHandle::new(tts))
}

fn work_dir() -> PathBuf {
    std::env::temp_dir().join(format!("detox-{}", std::process::id()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("detox=info")),
        )
        .init();

    info!("Detox v{} starting", env!("CARGO_PKG_VERSION"));

    let settings_path = settings_path();
    let settings = load_settings(&settings_path);
    if !settings_path.exists() {
        match save_settings(&settings_path, &settings) {
            Ok(()) => info!("wrote default settings to {:?}", settings_path),
            Err(e) => warn!("could not write default settings to {:?}: {e}", settings_path),
        }
    }
    apply_runtime_env_from_settings(&settings);
    info!(
        settings_path = ?settings_path,
        bind_addr = %settings.bind_addr,
        threshold = settings.toxicity_threshold,
        max_tokens = settings.max_tokens,
        narration = %settings.narration_backend,
        ort_ep = %settings.ort_ep,
        "runtime settings loaded"
    );

    // ── Pipeline ──────────────────────────────────────────────────────────
    let work_dir = work_dir();
    let store = Arc::new(
        NarrationStore::new(work_dir.join("narration"))
            .context("failed to create narration directory")?,
    );
    // Model loading and the blocking HTTP client both stay off the runtime.
    let startup_settings = settings.clone();
    let startup_store = Arc::clone(&store);
    let pipeline = tokio::task::spawn_blocking(move || -> anyhow::Result<DecisionPipeline> {
        let config = startup_settings.pipeline_config();
        let classifier = build_classifier(&startup_settings, &config);
        let pipeline = DecisionPipeline::new(
            config,
            build_transcriber(&startup_settings),
            classifier,
            build_narrator(&startup_settings)?,
            startup_store,
        );
        // Stubs are no-ops; ONNX backends load their sessions here.
        pipeline.warm_up().context("model warm-up failed")?;
        Ok(pipeline)
    })
    .await
    .context("pipeline startup task panicked")??;
    let pipeline = Arc::new(pipeline);

    // ── Narration sweep ───────────────────────────────────────────────────
    let ttl = chrono::Duration::seconds(settings.narration_ttl_secs as i64);
    let sweep_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let store = Arc::clone(&sweep_store);
            if let Err(e) = tokio::task::spawn_blocking(move || store.sweep(ttl)).await {
                warn!("narration sweep failed: {e}");
            }
        }
    });

    // ── HTTP ──────────────────────────────────────────────────────────────
    let state = AppState::new(
        pipeline,
        Duration::from_secs(settings.request_timeout_secs),
        work_dir.join("uploads"),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!("Detox listening on http://{}", settings.bind_addr);
    info!("Health check: http://{}/health", settings.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
