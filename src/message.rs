use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument};

use super::{Flags, Header, Networkable, Question, ResourceRecord};
use crate::header::Rcode;
use crate::{ByteCursor, ProtocolError, QueryNode};

/// Largest message sent over UDP.
pub const MAX_QUERY_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Answer, Section::Authority, Section::Additional];

    pub fn title(self) -> &'static str {
        match self {
            Self::Answer => "Answers",
            Self::Authority => "Nameservers",
            Self::Additional => "Additional Information",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub question: Option<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            ..Default::default()
        }
    }

    /// A single-question query with a fresh random id.
    pub fn query(node: &QueryNode) -> Self {
        let id = rand::random::<u16>();
        let mut query = Self::new(Header::new(id, Flags::query()));
        query.add_question(Question::from(node));
        query
    }

    pub fn add_question(&mut self, question: Question) {
        self.header.num_questions = 1;
        self.question = Some(question)
    }

    pub fn add_answer(&mut self, answer: ResourceRecord) {
        self.header.num_answers += 1;
        self.answers.push(answer)
    }

    pub fn add_authority(&mut self, answer: ResourceRecord) {
        self.header.num_authorities += 1;
        self.authorities.push(answer)
    }

    pub fn add_additional(&mut self, answer: ResourceRecord) {
        self.header.num_additionals += 1;
        self.additionals.push(answer)
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn is_authoritative(&self) -> bool {
        self.header.flags.aa()
    }

    pub fn rcode(&self) -> Rcode {
        self.header.flags.response_code()
    }

    pub fn section(&self, section: Section) -> &[ResourceRecord] {
        match section {
            Section::Answer => &self.answers,
            Section::Authority => &self.authorities,
            Section::Additional => &self.additionals,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut Vec<ResourceRecord> {
        match section {
            Section::Answer => &mut self.answers,
            Section::Authority => &mut self.authorities,
            Section::Additional => &mut self.additionals,
        }
    }

    fn declared_count(&self, section: Section) -> u16 {
        match section {
            Section::Answer => self.header.num_answers,
            Section::Authority => self.header.num_authorities,
            Section::Additional => self.header.num_additionals,
        }
    }

    /// Every record in wire order, tagged with its section.
    pub fn records(&self) -> impl Iterator<Item = (Section, &ResourceRecord)> + '_ {
        Section::ALL
            .into_iter()
            .flat_map(move |section| self.section(section).iter().map(move |r| (section, r)))
    }
}

impl Networkable for Message {
    #[instrument(level = "debug", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut response = BytesMut::new();
        response.extend_from_slice(&self.header.to_bytes());

        if let Some(question) = &self.question {
            response.extend_from_slice(&question.to_bytes())
        }

        for (_, record) in self.records() {
            response.extend_from_slice(&record.to_bytes())
        }

        response.into()
    }

    /// Decodes a whole message. Response codes that make the body
    /// meaningless fail before any section is read.
    #[instrument(level = "debug", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        let header = Header::from_bytes(bytes)?;
        header.flags.response_code().check()?;

        let mut message = Self::new(header);

        message.question = match message.header.num_questions {
            0 => None,
            1 => Some(Question::from_bytes(bytes)?),
            n => return Err(ProtocolError::MultipleQuestions(n)),
        };

        for section in Section::ALL {
            let count = message.declared_count(section);
            let records = message.section_mut(section);
            records.reserve(count as usize);
            for _ in 0..count {
                records.push(ResourceRecord::from_bytes(bytes)?);
            }
        }

        debug!(
            id = message.header.id,
            aa = message.is_authoritative(),
            answers = message.answers.len(),
            authorities = message.authorities.len(),
            additionals = message.additionals.len(),
            "decoded message"
        );

        Ok(message)
    }
}

/// Encodes a query for `node`, returning the bytes and the transaction id
/// the response must carry.
pub fn encode_query(node: &QueryNode) -> (Bytes, u16) {
    let query = Message::query(node);
    (query.to_bytes(), query.id())
}

pub fn decode_response(bytes: &[u8]) -> Result<Message, ProtocolError> {
    Message::from_bytes(&mut ByteCursor::new(bytes))
}
