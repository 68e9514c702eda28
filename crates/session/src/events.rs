use crate::message::Message;

/// Change notifications published by [`crate::SessionController`].
///
/// Each event is sent after the mutation it describes; a front end can
/// redraw from the payload alone or re-read the controller's snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new entry was appended at the end of the transcript.
    MessageAppended(Message),
    /// A pending entry settled to `committed` or `failed`.
    MessageUpdated(Message),
    /// The transcript was cleared; the payload is the fresh greeting.
    TranscriptReset(Message),
    /// A document was added or removed, or the selection changed.
    DocumentsChanged,
}
