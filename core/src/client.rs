use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MentoraConfig;
use crate::errors::{AuthFailure, MentoraError, MentoraResult, ValidationError};
use crate::transport::{HttpTransport, Transport, TransportResponse};
use crate::types::*;
use crate::validation::{
    decode_base64, encode_base64, validate_email, validate_file_name, validate_file_size,
    validate_query, validate_upload,
};

pub const VALIDATE_TEACHER_PATH: &str = "/microsoft-graph/validate-teacher";
pub const HEALTH_PATH: &str = "/health";

pub const FILE_READY_TEXT: &str = "Archivo generado exitosamente";
pub const EMPTY_REPLY_TEXT: &str = "Respuesta recibida";
const BULK_PROCESSED_TEXT: &str = "Archivo procesado correctamente";
const BULK_ERRORS_TEXT: &str = "Se encontraron errores de validación en el archivo";
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Client for the Mentora backend: validates input, routes each request
/// category to its endpoint and normalizes the response shapes.
pub struct MentoraClient<T = HttpTransport> {
    transport: Arc<T>,
    config: MentoraConfig,
}

impl<T> Clone for MentoraClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<T> fmt::Debug for MentoraClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MentoraClient")
            .field("api_url", &self.config.api_url())
            .finish()
    }
}

impl MentoraClient<HttpTransport> {
    /// Create a client talking HTTP to the configured backend
    pub fn new(config: MentoraConfig) -> MentoraResult<Self> {
        let transport = HttpTransport::new(&config)?;
        info!("Using Mentora backend at {}", transport.base_url());
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> MentoraClient<T> {
    pub fn with_transport(config: MentoraConfig, transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &MentoraConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a free-text query to the endpoint of `category`
    pub async fn send_query(
        &self,
        usuario: &str,
        pregunta: &str,
        category: RequestCategory,
    ) -> MentoraResult<Reply> {
        if category.is_file_upload() {
            return Err(ValidationError::FileCategory(category.label().to_string()).into());
        }
        let usuario = validate_email(usuario)?;
        let pregunta = validate_query(pregunta)?;

        let payload = serde_json::to_value(ChatRequest {
            usuario: usuario.to_string(),
            pregunta: pregunta.to_string(),
        })?;

        debug!("Dispatching {} query for {}", category.key(), usuario);
        let response = self.transport.post_json(category.path(), &payload).await?;
        normalize_reply(response)
    }

    /// Upload a base64-encoded spreadsheet to the bulk management endpoint
    pub async fn upload_bulk(
        &self,
        usuario: &str,
        filename: &str,
        file_base64: &str,
    ) -> MentoraResult<BulkOutcome> {
        let usuario = validate_email(usuario)?;
        let size = validate_upload(filename, file_base64)?;

        let payload = serde_json::to_value(BulkUploadRequest {
            usuario: usuario.to_string(),
            filename: filename.to_string(),
            file_base64: file_base64.trim().to_string(),
        })?;

        info!("Uploading {} ({} bytes) for bulk management", filename, size);
        let response = self
            .transport
            .post_json(RequestCategory::Gestion.path(), &payload)
            .await?;
        normalize_bulk(response, filename)
    }

    /// Read a local spreadsheet and upload it
    pub async fn upload_bulk_file(&self, usuario: &str, path: &Path) -> MentoraResult<BulkOutcome> {
        let sheet = load_spreadsheet(path).await?;
        self.upload_bulk(usuario, &sheet.filename, &sheet.file_base64)
            .await
    }

    /// Ask the identity validator whether `email` belongs to a known teacher
    pub async fn validate_teacher(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> MentoraResult<User> {
        let email = validate_email(email)?;
        let payload = serde_json::to_value(ValidateTeacherRequest {
            email: email.to_string(),
            password: password.map(str::to_string),
        })?;

        let response = self
            .transport
            .post_json(VALIDATE_TEACHER_PATH, &payload)
            .await?;

        match response.status {
            200 | 201 => {
                let body: ValidateTeacherResponse =
                    serde_json::from_value(response.body).unwrap_or_default();
                if let Some(note) = &body.note {
                    warn!("Identity validator note: {}", note);
                }
                match body.user {
                    Some(user) if body.success => Ok(user),
                    _ => Err(AuthFailure::Rejected(
                        body.message
                            .unwrap_or_else(|| "usuario no válido".to_string()),
                    )
                    .into()),
                }
            }
            401 => Err(AuthFailure::InvalidCredentials.into()),
            403 => Err(AuthFailure::AccessDenied.into()),
            404 => Err(AuthFailure::NotFound.into()),
            409 => Err(AuthFailure::UserNotFound.into()),
            500 => Err(AuthFailure::Server.into()),
            status => Err(api_error(status, &BackendResponse::from_value(&response.body))),
        }
    }

    /// True when the backend answers its health probe with OK
    pub async fn health_check(&self) -> bool {
        match self
            .transport
            .get(HEALTH_PATH, self.config.health_timeout())
            .await
        {
            Ok(response) if response.status == 200 => {
                let health: HealthResponse =
                    serde_json::from_value(response.body).unwrap_or_default();
                health.status.map_or(true, |status| status == "OK")
            }
            Ok(response) => {
                warn!("Health probe returned status {}", response.status);
                false
            }
            Err(e) => {
                warn!("Health probe failed: {}", e);
                false
            }
        }
    }
}

/// Read and encode a spreadsheet. Name and size are checked from metadata
/// before the file is loaded.
pub async fn load_spreadsheet(path: &Path) -> MentoraResult<Spreadsheet> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ValidationError::UnsupportedExtension(path.display().to_string()))?;
    validate_file_name(filename)?;

    let metadata = tokio::fs::metadata(path).await?;
    validate_file_size(usize::try_from(metadata.len()).unwrap_or(usize::MAX))?;

    let bytes = tokio::fs::read(path).await?;
    // The file may have changed since the metadata call
    validate_file_size(bytes.len())?;
    Ok(Spreadsheet {
        filename: filename.to_string(),
        file_base64: encode_base64(&bytes),
    })
}

/// Map a chat endpoint response to a reply or a failure.
pub fn normalize_reply(response: TransportResponse) -> MentoraResult<Reply> {
    let body = BackendResponse::from_value(&response.body);

    if !(response.is_created_or_ok() && body.is_success()) {
        return Err(api_error(response.status, &body));
    }

    if let Some((data, filename, content_type)) = body.file_parts() {
        let attachment = decode_attachment(data, filename, content_type)?;
        debug!("Reply carries file {} ({} bytes)", filename, attachment.len());
        return Ok(Reply {
            text: FILE_READY_TEXT.to_string(),
            attachment: Some(attachment),
        });
    }

    let text = body
        .data_text()
        .or_else(|| body.message.clone().filter(|m| !m.trim().is_empty()))
        .unwrap_or_else(|| EMPTY_REPLY_TEXT.to_string());
    Ok(Reply {
        text,
        attachment: None,
    })
}

/// Map a bulk management response. 200/201 means processed; 400 carries the
/// error spreadsheet; everything else fails.
pub fn normalize_bulk(response: TransportResponse, uploaded_name: &str) -> MentoraResult<BulkOutcome> {
    let body = BackendResponse::from_value(&response.body);
    let error_sheet = match &body.data {
        Some(Value::String(data)) if !data.is_empty() && !body.is_success() => Some(data.as_str()),
        _ => None,
    };

    match (response.status, error_sheet) {
        (200 | 201, None) if body.is_success() => Ok(BulkOutcome::Processed {
            message: body
                .message
                .clone()
                .unwrap_or_else(|| BULK_PROCESSED_TEXT.to_string()),
        }),
        (200 | 201 | 400, Some(data)) => {
            let filename = body
                .filename
                .clone()
                .unwrap_or_else(|| format!("errores_{}", uploaded_name));
            let content_type = body
                .content_type
                .clone()
                .unwrap_or_else(|| XLSX_CONTENT_TYPE.to_string());
            let attachment = decode_attachment(data, &filename, &content_type)?;
            Ok(BulkOutcome::ValidationErrors {
                message: body
                    .message
                    .clone()
                    .unwrap_or_else(|| BULK_ERRORS_TEXT.to_string()),
                attachment,
            })
        }
        (status, _) => Err(api_error(status, &body)),
    }
}

fn decode_attachment(data: &str, filename: &str, content_type: &str) -> MentoraResult<Attachment> {
    let bytes = decode_base64(data).map_err(|e| MentoraError::Decode(e.to_string()))?;
    Ok(Attachment {
        file_name: filename.to_string(),
        content_type: content_type.to_string(),
        bytes,
    })
}

/// Failure text priority: body message, then body error, then the status
fn api_error(status: u16, body: &BackendResponse) -> MentoraError {
    let message = body
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| body.error.clone().filter(|e| !e.trim().is_empty()))
        .unwrap_or_else(|| format!("error {}", status));
    MentoraError::Api {
        status_code: status,
        message,
    }
}
