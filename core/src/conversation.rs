//! Chat transcript and the single-flight request state around it.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::downloads::DownloadSink;
use crate::errors::{MentoraError, MentoraResult};
use crate::session::AuthSession;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Attachment, BulkOutcome, Message, Reply, RequestCategory};

pub const GREETING: &str = "¡Hola! Soy tu mentor educativo. Estoy aquí para ayudarte con la planificación de clases, recursos, adecuaciones pedagógicas, seguimiento y gestión. ¿En qué puedo ayudarte hoy?";
const CANCELLED_TEXT: &str = "La solicitud fue cancelada.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    /// Exactly one request in flight, identified by its generation
    AwaitingResponse { generation: u64 },
}

/// Why a send was refused without touching the transcript
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendRejection {
    #[error("el mensaje está vacío")]
    EmptyText,

    #[error("no hay una sesión iniciada")]
    NotAuthenticated,

    #[error("selecciona primero un tipo de consulta")]
    NoCategory,

    #[error("la categoría {0} requiere subir un archivo")]
    NeedsFile(RequestCategory),

    #[error("ya hay una solicitud en curso")]
    Busy,
}

/// What happened to a request once its result came back
#[derive(Debug)]
pub enum Turn {
    /// An assistant message with the reply was appended
    Answered,
    /// An assistant message explaining the failure was appended
    Failed(MentoraError),
    /// The request had been superseded; nothing was appended
    Stale,
}

impl Turn {
    pub fn is_answered(&self) -> bool {
        matches!(self, Turn::Answered)
    }
}

#[derive(Debug)]
enum Payload {
    Query { pregunta: String },
    Bulk { filename: String, file_base64: String },
}

/// Token for the request begun by `begin_send` or `begin_bulk_upload`
#[derive(Debug)]
pub struct PendingRequest {
    generation: u64,
    category: RequestCategory,
    usuario: String,
    payload: Payload,
}

impl PendingRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn category(&self) -> RequestCategory {
        self.category
    }

    pub fn usuario(&self) -> &str {
        &self.usuario
    }

    /// Query text, or the file name for a bulk upload
    pub fn subject(&self) -> &str {
        match &self.payload {
            Payload::Query { pregunta } => pregunta,
            Payload::Bulk { filename, .. } => filename,
        }
    }

    /// Encoded spreadsheet of a bulk upload
    pub fn file_base64(&self) -> Option<&str> {
        match &self.payload {
            Payload::Bulk { file_base64, .. } => Some(file_base64),
            Payload::Query { .. } => None,
        }
    }
}

/// Transcript, active category and in-flight status of one chat
pub struct Conversation<T = HttpTransport> {
    session: AuthSession<T>,
    downloads: Arc<dyn DownloadSink>,
    transcript: Vec<Message>,
    active: Option<RequestCategory>,
    state: ConversationState,
    generation: u64,
}

impl<T> std::fmt::Debug for Conversation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.transcript.len())
            .field("active", &self.active)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Transport> Conversation<T> {
    pub fn new(session: AuthSession<T>, downloads: Arc<dyn DownloadSink>) -> Self {
        Self {
            session,
            downloads,
            transcript: vec![Message::assistant(GREETING.to_string(), None)],
            active: None,
            state: ConversationState::Idle,
            generation: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }

    pub fn active_category(&self) -> Option<RequestCategory> {
        self.active
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ConversationState::AwaitingResponse { .. })
    }

    pub fn session(&self) -> &AuthSession<T> {
        &self.session
    }

    /// Make `category` the active one and return its usage hints
    pub fn select_category(&mut self, category: RequestCategory) -> &'static str {
        debug!("Active category: {}", category.key());
        self.active = Some(category);
        category.instructions()
    }

    /// Append the user turn and enter the awaiting state
    pub fn begin_send(
        &mut self,
        text: &str,
        category: Option<RequestCategory>,
    ) -> Result<PendingRequest, SendRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::EmptyText);
        }
        let category = category.or(self.active).ok_or(SendRejection::NoCategory)?;
        if category.is_file_upload() {
            return Err(SendRejection::NeedsFile(category));
        }
        let usuario = self.ready_user()?;

        self.transcript
            .push(Message::user(text.to_string(), Some(category)));
        Ok(self.enter_awaiting(
            category,
            usuario,
            Payload::Query {
                pregunta: text.to_string(),
            },
        ))
    }

    /// Append the user turn for a spreadsheet upload and enter the awaiting state
    pub fn begin_bulk_upload(
        &mut self,
        file_base64: &str,
        filename: &str,
    ) -> Result<PendingRequest, SendRejection> {
        if file_base64.trim().is_empty() || filename.trim().is_empty() {
            return Err(SendRejection::EmptyText);
        }
        let usuario = self.ready_user()?;
        let category = RequestCategory::Gestion;

        self.transcript.push(Message::user(
            format!("📎 Archivo enviado: {}", filename),
            Some(category),
        ));
        Ok(self.enter_awaiting(
            category,
            usuario,
            Payload::Bulk {
                filename: filename.to_string(),
                file_base64: file_base64.to_string(),
            },
        ))
    }

    /// Record the result of a text request
    pub fn complete(&mut self, pending: PendingRequest, result: MentoraResult<Reply>) -> Turn {
        if !self.is_current(&pending) {
            return Turn::Stale;
        }

        let category = Some(pending.category);
        let (message, turn) = match result {
            Ok(Reply {
                attachment: Some(attachment),
                ..
            }) => {
                let note = self.deliver(&attachment);
                let text = format!(
                    "✅ He generado el archivo \"{}\". {}",
                    attachment.file_name, note
                );
                (
                    Message::assistant(text, category).with_attachment(attachment),
                    Turn::Answered,
                )
            }
            Ok(Reply { text, .. }) => (Message::assistant(text, category), Turn::Answered),
            Err(e) => (Message::assistant(apology(&e), category), Turn::Failed(e)),
        };

        self.finish(message);
        turn
    }

    /// Record the result of a bulk upload
    pub fn complete_bulk(
        &mut self,
        pending: PendingRequest,
        result: MentoraResult<BulkOutcome>,
    ) -> Turn {
        if !self.is_current(&pending) {
            return Turn::Stale;
        }

        let category = Some(pending.category);
        let (message, turn) = match result {
            Ok(BulkOutcome::Processed { message }) => (
                Message::assistant(format!("✅ {}", message), category),
                Turn::Answered,
            ),
            Ok(BulkOutcome::ValidationErrors {
                message,
                attachment,
            }) => {
                let note = self.deliver(&attachment);
                let text = format!(
                    "⚠️ {}. Revisa el archivo \"{}\" con el detalle de los errores, corrígelo y vuelve a subirlo. {}",
                    message.trim_end_matches('.'),
                    attachment.file_name,
                    note
                );
                (
                    Message::assistant(text, category).with_attachment(attachment),
                    Turn::Answered,
                )
            }
            Err(e) => (Message::assistant(apology(&e), category), Turn::Failed(e)),
        };

        self.finish(message);
        turn
    }

    /// Abandon the in-flight request; a late result for it is discarded
    pub fn cancel_pending(&mut self) -> bool {
        if !self.is_loading() {
            return false;
        }
        warn!("Cancelling request generation {}", self.generation);
        let category = self.transcript.last().and_then(|m| m.request_type);
        self.finish(Message::assistant(CANCELLED_TEXT.to_string(), category));
        true
    }

    /// Send a text query and wait for the reply
    pub async fn send(
        &mut self,
        text: &str,
        category: Option<RequestCategory>,
    ) -> Result<Turn, SendRejection> {
        let pending = self.begin_send(text, category)?;
        let result = self
            .session
            .client()
            .send_query(&pending.usuario, pending.subject(), pending.category)
            .await;
        Ok(self.complete(pending, result))
    }

    /// Upload a base64-encoded spreadsheet and wait for the outcome
    pub async fn send_bulk_file(
        &mut self,
        file_base64: &str,
        filename: &str,
    ) -> Result<Turn, SendRejection> {
        let pending = self.begin_bulk_upload(file_base64, filename)?;
        let result = self
            .session
            .client()
            .upload_bulk(&pending.usuario, filename, file_base64)
            .await;
        Ok(self.complete_bulk(pending, result))
    }

    fn ready_user(&self) -> Result<String, SendRejection> {
        if self.is_loading() {
            return Err(SendRejection::Busy);
        }
        self.session
            .current_user()
            .map(|user| user.email)
            .ok_or(SendRejection::NotAuthenticated)
    }

    fn enter_awaiting(
        &mut self,
        category: RequestCategory,
        usuario: String,
        payload: Payload,
    ) -> PendingRequest {
        self.generation += 1;
        self.state = ConversationState::AwaitingResponse {
            generation: self.generation,
        };
        debug!(
            "Request generation {} started ({})",
            self.generation,
            category.key()
        );
        PendingRequest {
            generation: self.generation,
            category,
            usuario,
            payload,
        }
    }

    fn is_current(&self, pending: &PendingRequest) -> bool {
        let current = self.state
            == ConversationState::AwaitingResponse {
                generation: pending.generation,
            };
        if !current {
            debug!(
                "Discarding stale result for generation {}",
                pending.generation
            );
        }
        current
    }

    fn finish(&mut self, message: Message) {
        self.transcript.push(message);
        self.state = ConversationState::Idle;
    }

    fn deliver(&self, attachment: &Attachment) -> String {
        match self.downloads.deliver(attachment) {
            Ok(path) => format!("La descarga se guardó en {}.", path.display()),
            Err(e) => {
                warn!("Failed to save {}: {}", attachment.file_name, e);
                format!("No se pudo guardar automáticamente ({}).", e)
            }
        }
    }
}

fn apology(error: &MentoraError) -> String {
    format!("Lo siento, ocurrió un error: {}", error.friendly_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MentoraClient;
    use crate::config::MentoraConfig;
    use crate::downloads::recording::RecordingDownloads;
    use crate::errors::ValidationError;
    use crate::session::InMemorySessionStore;
    use crate::transport::fake::FakeTransport;
    use crate::types::Role;
    use crate::validation::encode_base64;
    use serde_json::json;

    struct Harness {
        conversation: Conversation<FakeTransport>,
        transport: FakeTransport,
        downloads: RecordingDownloads,
    }

    impl Harness {
        /// Calls made after sign-in
        fn chat_calls(&self) -> usize {
            self.transport.call_count() - 1
        }
    }

    fn harness_signed_out() -> (Conversation<FakeTransport>, FakeTransport) {
        let transport = FakeTransport::new();
        let client = MentoraClient::with_transport(MentoraConfig::default(), transport.clone());
        let session = AuthSession::new(client, Arc::new(InMemorySessionStore::new()));
        (
            Conversation::new(session, Arc::new(RecordingDownloads::default())),
            transport,
        )
    }

    async fn harness() -> Harness {
        let transport = FakeTransport::new();
        let client = MentoraClient::with_transport(MentoraConfig::default(), transport.clone());
        let session = AuthSession::new(client, Arc::new(InMemorySessionStore::new()));

        transport.respond(
            200,
            json!({
                "success": true,
                "user": {"id": "u1", "displayName": "Ana López", "email": "ana@colegio.edu", "isTeacher": true}
            }),
        );
        session.login("ana@colegio.edu", None).await.unwrap();

        let downloads = RecordingDownloads::default();
        Harness {
            conversation: Conversation::new(session, Arc::new(downloads.clone())),
            transport,
            downloads,
        }
    }

    #[tokio::test]
    async fn test_starts_idle_with_greeting() {
        let h = harness().await;
        assert_eq!(h.conversation.messages().len(), 1);
        assert_eq!(h.conversation.messages()[0].role, Role::Assistant);
        assert_eq!(h.conversation.state(), ConversationState::Idle);
        assert_eq!(h.conversation.active_category(), None);
    }

    #[tokio::test]
    async fn test_planificador_round_trip_toggles_loading() {
        let mut h = harness().await;
        h.transport
            .respond(200, json!({"success": true, "data": "Aquí está tu planificación"}));

        h.conversation.select_category(RequestCategory::Planificador);
        let before = h.conversation.messages().len();

        let pending = h.conversation.begin_send("Planifica 12", None).unwrap();
        assert!(h.conversation.is_loading());
        assert_eq!(h.conversation.messages().len(), before + 1);
        assert_eq!(h.conversation.last_message().unwrap().role, Role::User);

        let result = h
            .conversation
            .session()
            .client()
            .send_query(pending.usuario(), pending.subject(), pending.category())
            .await;
        let turn = h.conversation.complete(pending, result);

        assert!(turn.is_answered());
        assert!(!h.conversation.is_loading());
        let messages = h.conversation.messages();
        assert_eq!(messages.len(), before + 2);
        assert_eq!(messages[before].role, Role::User);
        assert_eq!(messages[before].content, "Planifica 12");
        assert_eq!(messages[before + 1].role, Role::Assistant);
        assert_eq!(messages[before + 1].content, "Aquí está tu planificación");
        assert_eq!(
            messages[before + 1].request_type,
            Some(RequestCategory::Planificador)
        );
        assert_eq!(h.transport.calls()[1].path, "/chat/planificador-frontend");
    }

    #[tokio::test]
    async fn test_send_appends_exactly_two_messages() {
        let mut h = harness().await;
        h.transport.respond(200, json!({"success": true, "message": "Sin datos"}));

        let turn = h
            .conversation
            .send("¿Qué contenidos se cubrieron en 12th?", Some(RequestCategory::Seguimiento))
            .await
            .unwrap();
        assert!(turn.is_answered());
        assert_eq!(h.conversation.messages().len(), 3);
        assert_eq!(h.conversation.last_message().unwrap().content, "Sin datos");
        assert!(h.conversation.last_message().unwrap().attachment.is_none());
        assert_eq!(h.conversation.state(), ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_selecting_categories_never_appends() {
        let mut h = harness().await;
        let instructions = h.conversation.select_category(RequestCategory::Adecuacion);
        assert!(instructions.contains("Adecuación Pedagógica"));
        h.conversation.select_category(RequestCategory::Recursos);

        assert_eq!(h.conversation.messages().len(), 1);
        assert_eq!(h.conversation.active_category(), Some(RequestCategory::Recursos));
        assert_eq!(h.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejections_leave_transcript_untouched() {
        let mut h = harness().await;
        assert_eq!(
            h.conversation.send("   ", Some(RequestCategory::Planificador)).await.unwrap_err(),
            SendRejection::EmptyText
        );
        assert_eq!(
            h.conversation.send("Planifica la clase 4", None).await.unwrap_err(),
            SendRejection::NoCategory
        );
        assert_eq!(
            h.conversation
                .send("Carga de docentes", Some(RequestCategory::Gestion))
                .await
                .unwrap_err(),
            SendRejection::NeedsFile(RequestCategory::Gestion)
        );
        assert_eq!(h.conversation.messages().len(), 1);
        assert_eq!(h.chat_calls(), 0);

        let (mut signed_out, transport) = harness_signed_out();
        assert_eq!(
            signed_out
                .send("Planifica la clase 4", Some(RequestCategory::Planificador))
                .await
                .unwrap_err(),
            SendRejection::NotAuthenticated
        );
        assert_eq!(signed_out.messages().len(), 1);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_query_becomes_friendly_assistant_message_without_network() {
        let mut h = harness().await;
        let turn = h
            .conversation
            .send("hola", Some(RequestCategory::Planificador))
            .await
            .unwrap();

        assert!(matches!(
            turn,
            Turn::Failed(MentoraError::Validation(ValidationError::QueryTooShort { .. }))
        ));
        assert_eq!(h.conversation.messages().len(), 3);
        let reply = h.conversation.last_message().unwrap();
        assert!(reply.content.starts_with("Lo siento"));
        assert!(reply.content.contains("muy corta"));
        assert_eq!(h.chat_calls(), 0);
        assert!(!h.conversation.is_loading());
    }

    #[tokio::test]
    async fn test_file_reply_is_attached_and_downloaded_once() {
        let mut h = harness().await;
        let bytes = vec![42u8; 2048];
        let encoded = encode_base64(&bytes);
        h.transport.respond(
            200,
            json!({
                "success": true,
                "data": encoded,
                "filename": "plan_clase_1.xlsx",
                "contentType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }),
        );

        h.conversation
            .send("Genera la planificación de la clase 1", Some(RequestCategory::Planificador))
            .await
            .unwrap();

        let reply = h.conversation.last_message().unwrap();
        let attachment = reply.attachment.as_ref().unwrap();
        assert_eq!(reply.file_name(), Some("plan_clase_1.xlsx"));
        assert_eq!(attachment.len(), bytes.len());
        assert!(reply.content.contains("plan_clase_1.xlsx"));
        assert!(reply.content.starts_with("✅ He generado el archivo"));

        let delivered = h.downloads.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].bytes, bytes);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_to_idle() {
        let mut h = harness().await;
        h.transport.fail("tiempo de espera agotado");

        let turn = h
            .conversation
            .send("Genera recursos para la unidad 2", Some(RequestCategory::Recursos))
            .await
            .unwrap();

        assert!(matches!(turn, Turn::Failed(MentoraError::Transport(_))));
        assert_eq!(h.conversation.state(), ConversationState::Idle);
        let reply = h.conversation.last_message().unwrap();
        assert!(reply.content.contains("tiempo de espera agotado"));

        // Still usable afterwards
        h.transport.respond(200, json!({"success": true, "data": "Listo"}));
        let turn = h
            .conversation
            .send("Genera recursos para la unidad 2", Some(RequestCategory::Recursos))
            .await
            .unwrap();
        assert!(turn.is_answered());
        assert_eq!(h.conversation.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_second_send_while_awaiting_is_busy() {
        let mut h = harness().await;
        h.conversation.select_category(RequestCategory::Planificador);
        let _pending = h.conversation.begin_send("Planifica la clase 1", None).unwrap();

        assert_eq!(
            h.conversation.begin_send("Planifica la clase 2", None).unwrap_err(),
            SendRejection::Busy
        );
        assert_eq!(h.conversation.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_result_after_cancel_is_discarded() {
        let mut h = harness().await;
        h.conversation.select_category(RequestCategory::Planificador);

        let stale = h.conversation.begin_send("Planifica la clase 1", None).unwrap();
        assert!(h.conversation.cancel_pending());
        assert!(!h.conversation.is_loading());

        let fresh = h.conversation.begin_send("Planifica la clase 2", None).unwrap();
        assert!(fresh.generation() > stale.generation());

        let late = h.conversation.complete(
            stale,
            Ok(Reply {
                text: "respuesta tardía".to_string(),
                attachment: None,
            }),
        );
        assert!(matches!(late, Turn::Stale));
        assert!(h.conversation.is_loading());

        let turn = h.conversation.complete(
            fresh,
            Ok(Reply {
                text: "respuesta actual".to_string(),
                attachment: None,
            }),
        );
        assert!(turn.is_answered());

        let contents: Vec<_> = h
            .conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            contents[1..].to_vec(),
            vec![
                "Planifica la clase 1",
                CANCELLED_TEXT,
                "Planifica la clase 2",
                "respuesta actual"
            ]
        );
        assert!(!h.conversation.cancel_pending());
    }

    #[tokio::test]
    async fn test_bulk_wrong_extension_and_size_never_reach_network() {
        let mut h = harness().await;

        let turn = h
            .conversation
            .send_bulk_file(&encode_base64(b"documento"), "x.docx")
            .await
            .unwrap();
        assert!(matches!(
            turn,
            Turn::Failed(MentoraError::Validation(ValidationError::UnsupportedExtension(_)))
        ));

        let big = encode_base64(&vec![1u8; 15 * 1024 * 1024]);
        let turn = h.conversation.send_bulk_file(&big, "carga.xlsx").await.unwrap();
        assert!(matches!(
            turn,
            Turn::Failed(MentoraError::Validation(ValidationError::FileTooLarge { .. }))
        ));

        assert_eq!(h.chat_calls(), 0);
        assert_eq!(h.conversation.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_bulk_three_way_outcomes() {
        let mut h = harness().await;
        let upload = encode_base64(b"hoja de docentes");

        h.transport
            .respond(200, json!({"success": true, "message": "Archivo procesado: 12 registros"}))
            .respond(
                400,
                json!({
                    "success": false,
                    "message": "Se encontraron errores.",
                    "data": encode_base64(b"fila 2: grado vacio"),
                    "filename": "errores.xlsx",
                    "contentType": "application/vnd.ms-excel"
                }),
            )
            .respond(500, json!({"message": "Servicio no disponible"}));

        let processed = h.conversation.send_bulk_file(&upload, "docentes.xlsx").await.unwrap();
        assert!(processed.is_answered());
        let reply = h.conversation.last_message().unwrap();
        assert_eq!(reply.content, "✅ Archivo procesado: 12 registros");
        assert!(reply.attachment.is_none());

        let with_errors = h.conversation.send_bulk_file(&upload, "docentes.xlsx").await.unwrap();
        assert!(with_errors.is_answered());
        let reply = h.conversation.last_message().unwrap();
        assert_eq!(reply.file_name(), Some("errores.xlsx"));
        assert!(reply.content.starts_with("⚠️ Se encontraron errores. Revisa"));

        let failed = h.conversation.send_bulk_file(&upload, "docentes.xlsx").await.unwrap();
        assert!(matches!(failed, Turn::Failed(MentoraError::Api { status_code: 500, .. })));
        let reply = h.conversation.last_message().unwrap();
        assert_eq!(reply.content, "Lo siento, ocurrió un error: Servicio no disponible");

        assert_eq!(h.downloads.delivered().len(), 1);
        assert_eq!(h.conversation.messages().len(), 7);
        assert_eq!(
            h.conversation.messages()[1].content,
            "📎 Archivo enviado: docentes.xlsx"
        );
    }
}
