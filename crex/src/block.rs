use crate::message::Encoding;
use std::fmt::Display;

/// Where a message came from, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Origin {
    pub source: String,
    pub offset: usize,
}

impl Origin {
    pub fn new(source: impl Into<String>, offset: usize) -> Self {
        Self {
            source: source.into(),
            offset,
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.source, self.offset)
    }
}

/// One undecoded message cut out of a file or buffer.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub encoding: Encoding,
    pub origin: Origin,
    pub data: Vec<u8>,
}

impl RawMessage {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ReportFile {
    messages: Vec<RawMessage>,
}

impl ReportFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_message(&mut self, message: RawMessage) {
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message_at(&self, index: usize) -> Option<&RawMessage> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }
}

impl IntoIterator for ReportFile {
    type Item = RawMessage;
    type IntoIter = std::vec::IntoIter<RawMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
