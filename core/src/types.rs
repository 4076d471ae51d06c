use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Authenticated teacher profile as returned by the identity validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub is_teacher: bool,
}

impl User {
    /// A stored record is usable only when the identifying fields are present
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.display_name.trim().is_empty()
            && !self.email.trim().is_empty()
    }

    /// First word of the display name, used for greetings
    pub fn first_name(&self) -> &str {
        self.display_name
            .split_whitespace()
            .next()
            .unwrap_or(&self.display_name)
    }
}

/// Predefined query type that decides backend routing and input affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Default,
    Planificador,
    Recursos,
    Adecuacion,
    Seguimiento,
    Gestion,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 6] = [
        RequestCategory::Default,
        RequestCategory::Planificador,
        RequestCategory::Recursos,
        RequestCategory::Adecuacion,
        RequestCategory::Seguimiento,
        RequestCategory::Gestion,
    ];

    /// Categories offered as quick actions
    pub const QUICK_ACTIONS: [RequestCategory; 5] = [
        RequestCategory::Planificador,
        RequestCategory::Recursos,
        RequestCategory::Adecuacion,
        RequestCategory::Seguimiento,
        RequestCategory::Gestion,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RequestCategory::Default => "default",
            RequestCategory::Planificador => "planificador",
            RequestCategory::Recursos => "recursos",
            RequestCategory::Adecuacion => "adecuacion",
            RequestCategory::Seguimiento => "seguimiento",
            RequestCategory::Gestion => "gestion",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestCategory::Default => "Consulta general",
            RequestCategory::Planificador => "Planificador",
            RequestCategory::Recursos => "Recursos",
            RequestCategory::Adecuacion => "Adecuación",
            RequestCategory::Seguimiento => "Seguimiento",
            RequestCategory::Gestion => "Gestión",
        }
    }

    /// Backend path the request for this category is posted to
    pub fn path(&self) -> &'static str {
        match self {
            RequestCategory::Default => "/chat/consult-frontend",
            RequestCategory::Planificador => "/chat/planificador-frontend",
            RequestCategory::Recursos => "/chat/recursos-frontend",
            RequestCategory::Adecuacion => "/chat/adecuacion-frontend",
            RequestCategory::Seguimiento => "/chat/seguimiento-frontend",
            RequestCategory::Gestion => "/chat/gestion-frontend",
        }
    }

    /// Bulk management takes a spreadsheet instead of free text
    pub fn is_file_upload(&self) -> bool {
        matches!(self, RequestCategory::Gestion)
    }

    pub fn sample_prompt(&self) -> Option<&'static str> {
        match self {
            RequestCategory::Planificador => Some(
                "Genera la planificación de la clase 1 de semana 2 unidad 4 para física fundamental de 12th",
            ),
            RequestCategory::Recursos => Some(
                "Genera recursos para la clase 1 de semana 2 unidad 3 de Comunicación y Lenguaje de 6th",
            ),
            RequestCategory::Adecuacion => Some(
                "Genera una adecuación pedagógica para Sofía Gómez de 3rd en lectura, con necesidad de instrucciones simplificadas y apoyo visual.",
            ),
            RequestCategory::Seguimiento => {
                Some("¿Qué contenidos declarativos se han cubierto en matemática de 12th?")
            }
            RequestCategory::Default | RequestCategory::Gestion => None,
        }
    }

    /// Usage hints shown when the category is selected
    pub fn instructions(&self) -> &'static str {
        match self {
            RequestCategory::Default => "Escribe tu consulta específica y te ayudaré con gusto.",
            RequestCategory::Planificador => {
                "**Planificador de Clases**\n\nPuedes pedirme que genere planificaciones de clase completas. Para mejores resultados, especifica:\n\n- Grado o nivel (ej: 12th, 3rd, secundaria)\n- Asignatura (ej: Matemáticas, Lenguaje, Ciencias)\n- Unidad y número de clase (ej: unidad 4, clase 1)\n- Cualquier detalle adicional que necesites incluir\n\nEjemplo: \"Genera la planificación de la clase 1 de semana 2 unidad 4 para física fundamental de 12th\""
            }
            RequestCategory::Recursos => {
                "**Generador de Recursos**\n\nPuedes pedirme recursos didácticos para tus clases: guías, actividades y material de apoyo. Especifica:\n\n- Grado o nivel (ej: 6th, 9th, bachillerato)\n- Asignatura (ej: Comunicación y Lenguaje, Matemáticas)\n- Unidad, semana y número de clase\n\nEjemplo: \"Genera recursos para la clase 1 de semana 2 unidad 3 de Comunicación y Lenguaje de 6th\""
            }
            RequestCategory::Adecuacion => {
                "**Adecuación Pedagógica**\n\nPuedes pedirme que genere adecuaciones pedagógicas para estudiantes con necesidades específicas. Incluye:\n\n- Nombre del estudiante\n- Grado (ej: 3rd, 7th)\n- Área académica (ej: lectura, matemáticas)\n- Tipo de necesidad o apoyo requerido\n\nEjemplo: \"Genera una adecuación pedagógica para Sofía Gómez de 3rd en lectura, con necesidad de instrucciones simplificadas y apoyo visual.\""
            }
            RequestCategory::Seguimiento => {
                "**Seguimiento Académico**\n\nPuedes consultarme sobre el avance de las planificaciones por docente o por grado y área. Especifica:\n\n- Asignatura o área académica\n- Grado o nivel\n- Tipo de contenido (declarativo, procedimental, actitudinal)\n- Período de tiempo o unidad específica\n\nEjemplo: \"¿Qué contenidos declarativos se han cubierto en matemática de 12th?\""
            }
            RequestCategory::Gestion => {
                "**Gestión Masiva**\n\nSube una hoja de cálculo (.xlsx o .xls, máximo 10 MB) para procesarla en el servidor.\n\n- Si el archivo es válido, se procesará y recibirás una confirmación\n- Si contiene errores, recibirás un archivo con el detalle de cada error para corregirlo"
            }
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RequestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                'í' => 'i',
                'ó' => 'o',
                'ú' => 'u',
                other => other,
            })
            .collect();

        RequestCategory::ALL
            .iter()
            .copied()
            .find(|category| {
                category.key() == normalized
                    || category.label().to_lowercase().replace('ó', "o") == normalized
            })
            .ok_or_else(|| {
                format!(
                    "Unknown category '{}'. Expected one of: {}",
                    s,
                    RequestCategory::ALL
                        .iter()
                        .map(|c| c.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Who authored a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Binary payload decoded from a backend response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One conversation turn. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub attachment: Option<Attachment>,
    pub request_type: Option<RequestCategory>,
}

impl Message {
    pub fn user(content: String, request_type: Option<RequestCategory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content,
            timestamp: Utc::now(),
            attachment: None,
            request_type,
        }
    }

    pub fn assistant(content: String, request_type: Option<RequestCategory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            attachment: None,
            request_type,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.file_name.as_str())
    }
}

/// Successful outcome of a text request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub attachment: Option<Attachment>,
}

/// Successful outcome of a bulk spreadsheet upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// The file was accepted and processed
    Processed { message: String },
    /// The server found row errors and returned a spreadsheet describing them
    ValidationErrors {
        message: String,
        attachment: Attachment,
    },
}

/// Spreadsheet read from disk, ready for the bulk management endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spreadsheet {
    pub filename: String,
    pub file_base64: String,
}

/// Payload for the text categories
#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub usuario: String,
    pub pregunta: String,
}

/// Payload for the bulk management category
#[derive(Serialize, Debug, Clone)]
pub struct BulkUploadRequest {
    pub usuario: String,
    pub filename: String,
    pub file_base64: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ValidateTeacherRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ValidateTeacherResponse {
    #[serde(default)]
    pub success: bool,
    pub user: Option<User>,
    pub message: Option<String>,
    pub note: Option<String>,
}

/// Common envelope of every chat endpoint response
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    pub success: Option<bool>,
    pub data: Option<Value>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl BackendResponse {
    /// Lenient parse: anything that is not the expected object yields an empty envelope
    pub fn from_value(body: &Value) -> Self {
        serde_json::from_value(body.clone()).unwrap_or_default()
    }

    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// The inline file triple, when all three parts are present
    pub fn file_parts(&self) -> Option<(&str, &str, &str)> {
        match (&self.data, &self.filename, &self.content_type) {
            (Some(Value::String(data)), Some(filename), Some(content_type))
                if !data.is_empty() && !filename.is_empty() =>
            {
                Some((data.as_str(), filename.as_str(), content_type.as_str()))
            }
            _ => None,
        }
    }

    /// `data` rendered as text; strings verbatim, other JSON serialized.
    /// Blank strings count as absent.
    pub fn data_text(&self) -> Option<String> {
        match &self.data {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct HealthResponse {
    pub status: Option<String>,
}
