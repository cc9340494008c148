use std::net::IpAddr;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{Message, QueryNode, ResolutionError};

/// What the resolver did, step by step, for verbose output.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    QuerySent {
        id: u16,
        node: QueryNode,
        server: IpAddr,
        attempt: u32,
    },
    Response {
        server: IpAddr,
        message: Message,
    },
    Failed {
        node: QueryNode,
        reason: ResolutionError,
    },
}

#[derive(Debug, Default)]
pub(super) struct Tracer {
    verbose: bool,
    subscribers: Vec<UnboundedSender<TraceEvent>>,
}

impl Tracer {
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<TraceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Builds the event only when someone will see it.
    pub fn emit(&mut self, event: impl FnOnce() -> TraceEvent) {
        if !self.verbose || self.subscribers.is_empty() {
            return;
        }

        let event = event();
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
