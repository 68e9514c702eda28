//! Line-oriented terminal front end.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tutor_session::{
    DocumentId, DocumentRef, DocumentUpload, Message, MessageStatus, Role, SessionController,
    SessionEvent,
};

/// Extensions the backend accepts for upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx", "png", "jpg", "jpeg"];
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const HELP: &str = "\
Commands:
  <text>            ask the assistant
  /upload <path>    upload a document (pdf, txt, doc, docx, png, jpg, jpeg)
  /docs             list uploaded documents
  /select <n|id>    ground answers in a document
  /deselect         stop grounding answers
  /delete <n|id>    remove a document
  /new              start a new chat
  /help             show this help
  /quit             exit";

/// A document named either by its position in `/docs` (1-based) or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTarget {
    Index(usize),
    Id(DocumentId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Send(String),
    Upload(PathBuf),
    Docs,
    Select(DocumentTarget),
    Deselect,
    Delete(DocumentTarget),
    New,
    Help,
    Quit,
    Invalid(String),
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command, ""),
    };

    match name {
        "upload" if argument.is_empty() => Command::Invalid("usage: /upload <path>".to_string()),
        "upload" => Command::Upload(PathBuf::from(argument)),
        "docs" => Command::Docs,
        "select" => match parse_target(argument) {
            Some(target) => Command::Select(target),
            None => Command::Invalid("usage: /select <number|id>".to_string()),
        },
        "deselect" => Command::Deselect,
        "delete" => match parse_target(argument) {
            Some(target) => Command::Delete(target),
            None => Command::Invalid("usage: /delete <number|id>".to_string()),
        },
        "new" => Command::New,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{other}; try /help")),
    }
}

fn parse_target(argument: &str) -> Option<DocumentTarget> {
    if argument.is_empty() {
        return None;
    }
    if let Ok(index) = argument.parse::<usize>() {
        return (index > 0).then_some(DocumentTarget::Index(index));
    }
    DocumentId::parse(argument).ok().map(DocumentTarget::Id)
}

pub async fn run(controller: Arc<SessionController>) -> io::Result<()> {
    let printer = tokio::spawn(print_events(controller.subscribe()));

    for message in controller.entries() {
        println!("{}", render_message(&message));
    }
    println!("(type /help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Command::Quit => break,
            command => dispatch(&controller, command).await,
        }
    }

    printer.abort();
    Ok(())
}

async fn dispatch(controller: &Arc<SessionController>, command: Command) {
    match command {
        Command::Empty | Command::Quit => {}
        Command::Send(text) => {
            if controller.is_sending() {
                println!("still waiting for the previous reply");
                return;
            }
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                if let Err(error) = controller.send_message(&text).await {
                    tracing::warn!(error = %error, "chat message was not sent");
                    println!("{error}");
                }
            });
        }
        Command::Upload(path) => {
            let upload = match read_upload(&path).await {
                Ok(upload) => upload,
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "upload refused locally"
                    );
                    println!("{error}");
                    return;
                }
            };
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                // Failed uploads surface as a transcript notice.
                if let Err(error) = controller.upload_document(upload).await {
                    tracing::error!(error = %error, "upload could not be recorded");
                    println!("{error}");
                }
            });
        }
        Command::Docs => {
            let documents = controller.documents();
            let selected = controller.selected_document();
            println!("{}", render_documents(&documents, selected.as_ref()));
        }
        Command::Select(target) => {
            let Some(id) = resolve(controller, &target) else {
                println!("no such document; see /docs");
                return;
            };
            match controller.select_document(id) {
                Ok(document) => println!("answers will use \"{}\"", document.display_name),
                Err(error) => println!("{error}"),
            }
        }
        Command::Deselect => {
            controller.deselect_document();
            println!("answers will not use a document");
        }
        Command::Delete(target) => {
            let removed =
                resolve(controller, &target).and_then(|id| controller.delete_document(id));
            match removed {
                Some(document) => println!("removed \"{}\"", document.display_name),
                None => println!("no such document; see /docs"),
            }
        }
        Command::New => {
            controller.start_new_chat();
        }
        Command::Help => println!("{HELP}"),
        Command::Invalid(reason) => println!("{reason}"),
    }
}

fn resolve(controller: &SessionController, target: &DocumentTarget) -> Option<DocumentId> {
    match target {
        DocumentTarget::Id(id) => Some(*id),
        DocumentTarget::Index(index) => controller
            .documents()
            .get(index.checked_sub(1)?)
            .map(|document| document.id),
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UploadCheckError {
    #[snafu(display("{} is not a file", path.display()))]
    NotAFile { stage: &'static str, path: PathBuf },
    #[snafu(display(
        "{file_name} is not a supported document; use one of {}",
        SUPPORTED_EXTENSIONS.join(", ")
    ))]
    UnsupportedExtension {
        stage: &'static str,
        file_name: String,
    },
    #[snafu(display("could not read {} on `{stage}`: {source}", path.display()))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display(
        "{file_name} is {size} bytes, larger than the {} MB upload limit",
        MAX_UPLOAD_BYTES / (1024 * 1024)
    ))]
    TooLarge {
        stage: &'static str,
        file_name: String,
        size: u64,
    },
}

/// Validates a local file and reads it for upload.
///
/// Size is checked from metadata so oversized files are never buffered.
async fn read_upload(path: &Path) -> Result<DocumentUpload, UploadCheckError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context(NotAFileSnafu {
            stage: "resolve-upload-name",
            path: path.to_path_buf(),
        })?
        .to_string();
    check_extension(&file_name)?;

    let metadata = tokio::fs::metadata(path).await.context(ReadFileSnafu {
        stage: "inspect-upload-file",
        path: path.to_path_buf(),
    })?;
    ensure!(
        metadata.is_file(),
        NotAFileSnafu {
            stage: "inspect-upload-file",
            path: path.to_path_buf(),
        }
    );
    ensure!(
        metadata.len() <= MAX_UPLOAD_BYTES,
        TooLargeSnafu {
            stage: "check-upload-size",
            file_name: file_name.clone(),
            size: metadata.len(),
        }
    );

    let bytes = tokio::fs::read(path).await.context(ReadFileSnafu {
        stage: "read-upload-file",
        path: path.to_path_buf(),
    })?;

    Ok(DocumentUpload::new(file_name, bytes))
}

fn check_extension(file_name: &str) -> Result<(), UploadCheckError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    ensure!(
        SUPPORTED_EXTENSIONS.contains(&extension.as_str()),
        UnsupportedExtensionSnafu {
            stage: "check-upload-extension",
            file_name,
        }
    );
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render_event(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "transcript printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Terminal line for one event, if it changes what the user sees.
///
/// The user's own text is already on screen, so pending echoes print nothing.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::MessageAppended(message) if message.role == Role::User => None,
        SessionEvent::MessageAppended(message) => Some(render_message(message)),
        SessionEvent::MessageUpdated(message) if message.status == MessageStatus::Failed => {
            Some(render_message(message))
        }
        SessionEvent::MessageUpdated(_) | SessionEvent::DocumentsChanged => None,
        SessionEvent::TranscriptReset(greeting) => {
            Some(format!("--- new chat ---\n{}", render_message(greeting)))
        }
    }
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "tutor",
    };
    match message.status {
        MessageStatus::Failed => format!("{speaker}> {} (not delivered)", message.text),
        MessageStatus::Committed | MessageStatus::Pending => {
            format!("{speaker}> {}", message.text)
        }
    }
}

pub fn render_documents(documents: &[DocumentRef], selected: Option<&DocumentRef>) -> String {
    if documents.is_empty() {
        return "no documents uploaded yet".to_string();
    }

    documents
        .iter()
        .enumerate()
        .map(|(index, document)| {
            let marker = if selected.is_some_and(|selected| selected.id == document.id) {
                " [selected]"
            } else {
                ""
            };
            format!(
                "{:>3}. {} ({}, {:.2} KB){marker}\n     {}",
                index + 1,
                document.display_name,
                document.media_kind,
                document.byte_size as f64 / 1024.0,
                document.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use tutor_session::MessageId;

    use super::*;

    fn syllabus() -> DocumentRef {
        DocumentRef::new(DocumentId::new_v7(), "syllabus.pdf", 2048, "pdf")
    }

    #[test]
    fn plain_text_is_sent_trimmed() {
        assert_eq!(
            parse("  how do I grade essays?  "),
            Command::Send("how do I grade essays?".to_string())
        );
        assert_eq!(parse("   "), Command::Empty);
    }

    #[test]
    fn commands_take_their_arguments() {
        assert_eq!(
            parse("/upload ~/Lessons/week 3.pdf"),
            Command::Upload(PathBuf::from("~/Lessons/week 3.pdf"))
        );
        assert_eq!(parse("/select 2"), Command::Select(DocumentTarget::Index(2)));
        assert_eq!(parse("/docs"), Command::Docs);
        assert_eq!(parse("/deselect"), Command::Deselect);
        assert_eq!(parse("/new"), Command::New);
        assert_eq!(parse("/help"), Command::Help);
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/exit"), Command::Quit);
    }

    #[test]
    fn documents_can_be_named_by_id() {
        let id = DocumentId::new_v7();
        assert_eq!(
            parse(&format!("/delete {id}")),
            Command::Delete(DocumentTarget::Id(id))
        );
    }

    #[test]
    fn malformed_commands_explain_themselves() {
        assert!(matches!(parse("/upload"), Command::Invalid(_)));
        assert!(matches!(parse("/select 0"), Command::Invalid(_)));
        assert!(matches!(parse("/delete not-an-id"), Command::Invalid(_)));
        assert_eq!(
            parse("/grade"),
            Command::Invalid("unknown command /grade; try /help".to_string())
        );
    }

    #[test]
    fn failed_user_messages_are_marked() {
        let mut message = Message::user_pending(MessageId::new(3), "plan my week");
        assert_eq!(
            render_event(&SessionEvent::MessageAppended(message.clone())),
            None
        );

        message.status = MessageStatus::Failed;
        assert_eq!(
            render_event(&SessionEvent::MessageUpdated(message)).as_deref(),
            Some("you> plan my week (not delivered)")
        );
    }

    #[test]
    fn assistant_messages_and_resets_are_printed() {
        let reply = Message::assistant(MessageId::new(4), "Try station rotation.");
        assert_eq!(
            render_event(&SessionEvent::MessageAppended(reply)).as_deref(),
            Some("tutor> Try station rotation.")
        );

        let greeting = Message::assistant(MessageId::new(5), "Hello!");
        assert_eq!(
            render_event(&SessionEvent::TranscriptReset(greeting)).as_deref(),
            Some("--- new chat ---\ntutor> Hello!")
        );
        assert_eq!(render_event(&SessionEvent::DocumentsChanged), None);
    }

    #[test]
    fn document_listing_marks_the_selection() {
        let syllabus = syllabus();
        let rubric = DocumentRef::new(DocumentId::new_v7(), "rubric.docx", 512, "docx");
        let listing = render_documents(&[syllabus.clone(), rubric], Some(&syllabus));

        let lines = listing.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "  1. syllabus.pdf (pdf, 2.00 KB) [selected]");
        assert_eq!(lines[2], "  2. rubric.docx (docx, 0.50 KB)");
        assert_eq!(render_documents(&[], None), "no documents uploaded yet");
    }

    #[test]
    fn only_supported_extensions_are_uploaded() {
        assert!(check_extension("Syllabus.PDF").is_ok());
        assert!(check_extension("photo.jpeg").is_ok());
        assert!(matches!(
            check_extension("grades.xlsx"),
            Err(UploadCheckError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            check_extension("Makefile"),
            Err(UploadCheckError::UnsupportedExtension { .. })
        ));
    }

    #[tokio::test]
    async fn unreadable_upload_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");

        let error = read_upload(&missing).await.unwrap_err();
        assert!(matches!(
            error,
            UploadCheckError::ReadFile { ref path, .. } if *path == missing
        ));
    }

    #[tokio::test]
    async fn directories_are_not_uploaded() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("lessons.pdf");
        std::fs::create_dir(&folder).unwrap();

        let error = read_upload(&folder).await.unwrap_err();
        assert!(matches!(error, UploadCheckError::NotAFile { .. }));
    }

    #[tokio::test]
    async fn oversized_upload_is_refused_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanned-textbook.pdf");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_UPLOAD_BYTES + 1).unwrap();

        let error = read_upload(&path).await.unwrap_err();
        assert!(matches!(
            error,
            UploadCheckError::TooLarge { size, .. } if size == MAX_UPLOAD_BYTES + 1
        ));
    }

    #[tokio::test]
    async fn readable_upload_keeps_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "fractions unit").unwrap();

        let upload = read_upload(&path).await.unwrap();
        assert_eq!(upload.file_name, "notes.txt");
        assert_eq!(upload.bytes, b"fractions unit");
    }
}
