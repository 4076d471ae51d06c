use thiserror::Error;

/// Input rejected before any request leaves the client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("La consulta no puede estar vacía")]
    EmptyQuery,

    #[error("La consulta debe tener al menos {min} caracteres (tiene {actual})")]
    QueryTooShort { min: usize, actual: usize },

    #[error("La consulta no puede superar {max} caracteres (tiene {actual})")]
    QueryTooLong { max: usize, actual: usize },

    #[error("Email de usuario no válido")]
    InvalidEmail,

    #[error("Formato de archivo no permitido: {0}. Solo se aceptan archivos .xlsx o .xls")]
    UnsupportedExtension(String),

    #[error("El archivo supera el tamaño máximo de {max} bytes (tiene {size})")]
    FileTooLarge { size: usize, max: usize },

    #[error("El nombre del archivo es demasiado largo ({len} caracteres, máximo {max})")]
    FileNameTooLong { len: usize, max: usize },

    #[error("El archivo está vacío")]
    EmptyFile,

    #[error("El contenido del archivo no es base64 válido")]
    MalformedFile,

    #[error("La categoría {0} requiere subir un archivo")]
    FileCategory(String),
}

impl ValidationError {
    /// Wording shown in the transcript for this condition
    pub fn friendly_message(&self) -> String {
        match self {
            ValidationError::QueryTooShort { min, .. } => format!(
                "Tu consulta es muy corta. Escribe al menos {} caracteres para que pueda ayudarte mejor.",
                min
            ),
            ValidationError::QueryTooLong { max, .. } => format!(
                "Tu consulta es muy larga. Intenta resumirla en menos de {} caracteres.",
                max
            ),
            ValidationError::InvalidEmail => {
                "Tu correo electrónico no es válido. Cierra sesión y vuelve a ingresar.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Identity validation failures, one per status the validator distinguishes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Credenciales incorrectas")]
    InvalidCredentials,

    #[error("Acceso denegado: el usuario no tiene permisos de docente")]
    AccessDenied,

    #[error("Servicio de validación no encontrado")]
    NotFound,

    #[error("Usuario no encontrado en el directorio")]
    UserNotFound,

    #[error("Error interno del servidor de validación")]
    Server,

    #[error("El usuario no está registrado como docente")]
    NotATeacher,

    #[error("Validación rechazada: {0}")]
    Rejected(String),
}

/// Mentora client errors
#[derive(Error, Debug)]
pub enum MentoraError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("No se pudo contactar con el servidor: {0}")]
    Transport(String),

    #[error("{message}")]
    Api { status_code: u16, message: String },

    #[error("Error al procesar el archivo: {0}")]
    Decode(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Session Error: {0}")]
    SessionError(String),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl MentoraError {
    /// Text for the assistant turn that reports this failure
    pub fn friendly_message(&self) -> String {
        match self {
            MentoraError::Validation(e) => e.friendly_message(),
            other => other.to_string(),
        }
    }

    /// True when the failure happened before any request was issued
    pub fn is_validation(&self) -> bool {
        matches!(self, MentoraError::Validation(_))
    }
}

/// Result type for Mentora operations
pub type MentoraResult<T> = Result<T, MentoraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_messages_for_common_validation_failures() {
        let short = MentoraError::from(ValidationError::QueryTooShort { min: 10, actual: 4 });
        assert!(short.friendly_message().contains("muy corta"));
        assert!(short.is_validation());

        let long = MentoraError::from(ValidationError::QueryTooLong { max: 500, actual: 501 });
        assert!(long.friendly_message().contains("muy larga"));

        let email = MentoraError::from(ValidationError::InvalidEmail);
        assert!(email.friendly_message().contains("correo"));
    }

    #[test]
    fn test_api_error_displays_server_message() {
        let err = MentoraError::Api {
            status_code: 422,
            message: "Grado no reconocido".to_string(),
        };
        assert_eq!(err.to_string(), "Grado no reconocido");
        assert!(!err.is_validation());
    }
}
