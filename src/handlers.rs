use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;

use crate::classifier::{argmax, Classifier, ClassifierError};
use crate::error::ApiError;
use crate::models::{ClassList, GifResponse, LabelMap, PredictionResponse};
use crate::preprocess::{self, InputSpec};

const UPLOAD_FIELD: &str = "file";
const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Everything a request needs, built once at start-up and shared read-only.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub labels: LabelMap,
    pub classes: ClassList,
    pub input: InputSpec,
    pub gif_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl AppState {
    /// Bytes to label: decode, preprocess, classify, look up the animation.
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResponse, ApiError> {
        let image = preprocess::decode(bytes).map_err(ApiError::InvalidImage)?;
        let input = preprocess::image_to_tensor(&image, &self.input);

        let scores = self.classifier.classify(&input)?;
        if scores.len() != self.classes.len() {
            return Err(ClassifierError::OutputMismatch {
                expected: self.classes.len(),
                actual: scores.len(),
            }
            .into());
        }

        let gesture = argmax(&scores)
            .and_then(|index| self.classes.get(index))
            .ok_or_else(|| ApiError::Internal("model returned no usable score".into()))?;

        Ok(PredictionResponse {
            gesture: gesture.to_string(),
            gif: self.labels.gif_url(gesture),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, static_dir: &Path) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/gif/{filename}").route(web::get().to(gif)))
        .service(web::resource("/text_to_gif").route(web::get().to(text_to_gif)))
        .service(Files::new("/static", static_dir));
}

fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reads the first `file` field, returning its filename and contents.
async fn read_upload(payload: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::Multipart(e.to_string()))?;

        let disposition = field.content_disposition();
        if disposition.get_name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = disposition.get_filename().unwrap_or_default().to_owned();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
            data.extend_from_slice(&chunk);
        }

        return Ok((filename, data));
    }

    Err(ApiError::MissingFile)
}

pub async fn predict(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (filename, data) = read_upload(&mut payload).await?;
    if !allowed_file(&filename) {
        return Err(ApiError::UnsupportedFileType);
    }

    let worker_state = state.clone();
    let prediction = web::block(move || worker_state.predict(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    log::info!(
        "{} classified as {} (gif: {})",
        filename,
        prediction.gesture,
        prediction.gif.as_deref().unwrap_or("none")
    );

    Ok(HttpResponse::Ok().json(prediction))
}

/// Raw query pairs: a repeated `text` resolves to its first value instead of failing.
pub async fn text_to_gif(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> HttpResponse {
    let text = query
        .iter()
        .find(|(key, _)| key == "text")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default();

    HttpResponse::Ok().json(GifResponse {
        gif: state.labels.gif_url(text),
    })
}

pub async fn gif(
    state: web::Data<AppState>,
    filename: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let filename = filename.into_inner();

    // Only bare file names; anything that could climb out of gif_dir is treated as missing.
    let is_plain = Path::new(&filename).file_name().and_then(|name| name.to_str())
        == Some(filename.as_str());
    if !is_plain {
        return Err(ApiError::AssetNotFound(filename));
    }

    NamedFile::open(state.gif_dir.join(&filename)).map_err(|_| ApiError::AssetNotFound(filename))
}

pub async fn index(state: web::Data<AppState>) -> Result<NamedFile, ApiError> {
    NamedFile::open(state.static_dir.join("index.html"))
        .map_err(|_| ApiError::AssetNotFound("index.html".into()))
}
