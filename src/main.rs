mod classifier;
mod config;
mod error;
mod handlers;
mod models;
mod preprocess;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use ndarray::Array4;

use classifier::{Classifier, ClassifierError, TractClassifier};
use config::Config;
use error::StartupError;
use handlers::AppState;
use models::{ClassList, LabelMap};
use preprocess::InputSpec;

/// The explicit class file wins; otherwise the sorted label-map keys.
fn resolve_classes(config: &Config, labels: &LabelMap) -> Result<ClassList, StartupError> {
    match &config.classes {
        Some(path) => ClassList::from_path(path),
        None if labels.is_empty() => Err(StartupError::NoClasses(config.gif_map.clone())),
        None => Ok(ClassList::from_label_map(labels)),
    }
}

/// Runs the model once on a blank image so a model/class-list mismatch fails
/// start-up instead of every request.
fn check_classes(
    classifier: &dyn Classifier,
    input: &InputSpec,
    classes: &ClassList,
) -> Result<(), StartupError> {
    let scores = classifier.classify(&Array4::zeros(input.shape()))?;
    if scores.len() != classes.len() {
        return Err(ClassifierError::OutputMismatch {
            expected: classes.len(),
            actual: scores.len(),
        }
        .into());
    }
    Ok(())
}

/// Loads the label map, class list and model, and checks that they agree.
fn load_state(config: &Config) -> Result<AppState, StartupError> {
    let labels = LabelMap::from_path(&config.gif_map)?;
    let classes = resolve_classes(config, &labels)?;
    log::info!(
        "Loaded {} gif mappings and {} classes",
        labels.len(),
        classes.len()
    );

    let input = config.input_spec();
    log::info!("Loading model from {}", config.model.display());
    let classifier = TractClassifier::from_onnx(&config.model, &input)?;
    check_classes(&classifier, &input, &classes)?;

    Ok(AppState {
        classifier: Arc::new(classifier),
        labels,
        classes,
        input,
        gif_dir: config.gif_dir.clone(),
        static_dir: config.static_dir.clone(),
    })
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let state = load_state(&config).map_err(|e| {
        log::error!("Startup failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;
    let state = web::Data::new(state);

    let (host, port) = config.bind_addr();
    log::info!("Server running at http://{}:{}", host, port);

    let static_dir = config.static_dir.clone();
    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| handlers::configure(cfg, &static_dir))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind((host, port))?.run().await
}
