use std::net::{IpAddr, SocketAddr};

use async_recursion::async_recursion;
use bytes::Bytes;
use itertools::Itertools;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    decode_response, encode_query, Cache, Message, Name, ProtocolError, QueryNode, Rcode,
    RecordData, RecordType, ResolutionError, ResolverConfig, ResourceRecord, TransportError,
};

mod trace;
pub use trace::TraceEvent;
use trace::Tracer;

mod transport;
pub use transport::{Transport, UdpTransport, MAX_RESPONSE_LEN};


/// State of one lookup, or of one sub-lookup started for a CNAME target or
/// a glueless nameserver.
#[derive(Debug, Clone)]
struct ResolutionContext {
    node: QueryNode,
    server: IpAddr,
    /// CNAME chases and glueless nameserver lookups so far
    depth: usize,
    /// Referrals followed so far
    referrals: usize,
}

impl ResolutionContext {
    fn new(node: QueryNode, server: IpAddr, depth: usize) -> Self {
        Self {
            node,
            server,
            depth,
            referrals: 0,
        }
    }

    fn referred_to(&self, server: IpAddr) -> Self {
        Self {
            node: self.node.clone(),
            server,
            depth: self.depth,
            referrals: self.referrals + 1,
        }
    }
}

/// Iterative resolver walking down from a root server.
///
/// Queries go out one at a time; every record seen in any response is
/// cached before the response is interpreted.
pub struct Resolver<T = UdpTransport> {
    config: ResolverConfig,
    cache: Cache,
    transport: T,
    tracer: Tracer,
}

impl Resolver<UdpTransport> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_transport(config, UdpTransport::new())
    }
}

impl<T: Transport> Resolver<T> {
    pub fn with_transport(config: ResolverConfig, transport: T) -> Self {
        Self {
            cache: Cache::new(config.normalize_names),
            config,
            transport,
            tracer: Tracer::default(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn root_server(&self) -> IpAddr {
        self.config.root_server
    }

    pub fn set_root_server(&mut self, root_server: IpAddr) {
        info!(%root_server, "root server changed");
        self.config.root_server = root_server;
    }

    pub fn verbose(&self) -> bool {
        self.tracer.verbose()
    }

    /// Turns the trace event stream on or off.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.tracer.set_verbose(verbose);
    }

    /// A stream of [`TraceEvent`]s, fed while verbose tracing is on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<TraceEvent> {
        self.tracer.subscribe()
    }

    /// Resolves `name`/`type_` starting at the root server.
    ///
    /// An error explains an empty result; it never means more than that.
    pub async fn lookup(
        &mut self,
        name: Name,
        type_: RecordType,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        let node = QueryNode::new(name, type_);
        let ctx = ResolutionContext::new(node.clone(), self.config.root_server, 0);

        let result = self.resolve(ctx).await;

        match &result {
            Ok(records) => debug!(%node, found = records.len(), "lookup finished"),
            Err(reason) => {
                warn!(%node, %reason, "lookup failed");
                self.tracer.emit(|| TraceEvent::Failed {
                    node,
                    reason: reason.clone(),
                });
            }
        }

        result
    }

    /// `Ok` is a final answer for this branch, possibly empty. `Err` means
    /// this server led nowhere and the caller may try another one.
    #[async_recursion]
    async fn resolve(
        &mut self,
        ctx: ResolutionContext,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        if ctx.depth > self.config.max_indirection {
            warn!(node = %ctx.node, "maximum number of indirection levels reached");
            return Err(ResolutionError::IndirectionLimit(self.config.max_indirection));
        }

        let cached = self.cache.lookup(&ctx.node);
        if !cached.is_empty() {
            debug!(node = %ctx.node, "answered from cache");
            return Ok(cached);
        }

        if let Some(target) = self.cached_cname(&ctx.node) {
            debug!(node = %ctx.node, %target, "alias found in cache");
            return self.chase_cname(&ctx, target).await;
        }

        let message = self.query(&ctx.node, ctx.server).await?;

        for (_, record) in message.records() {
            self.cache.insert(record.clone());
        }

        match message.rcode() {
            Rcode::NameError => {
                debug!(node = %ctx.node, server = %ctx.server, "name does not exist");
                return Ok(Vec::new());
            }
            Rcode::Refused => {
                warn!(node = %ctx.node, server = %ctx.server, "query refused");
                return Err(ResolutionError::Refused(ctx.server));
            }
            _ => {}
        }

        if message.is_authoritative() || !message.answers.is_empty() {
            self.answer(&ctx, &message).await
        } else {
            self.follow_referral(&ctx, &message).await
        }
    }

    async fn answer(
        &mut self,
        ctx: &ResolutionContext,
        message: &Message,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        if message.answers.is_empty() {
            debug!(node = %ctx.node, "authoritative answer without records");
            return Ok(Vec::new());
        }

        if ctx.node.type_ == RecordType::Any {
            return Ok(message.answers.clone());
        }

        let direct: Vec<ResourceRecord> = message
            .answers
            .iter()
            .filter(|r| r.type_ == ctx.node.type_ && self.same_name(&r.name, &ctx.node.name))
            .cloned()
            .collect();
        if !direct.is_empty() {
            return Ok(direct);
        }

        let alias = message
            .answers
            .iter()
            .filter(|r| self.same_name(&r.name, &ctx.node.name))
            .find_map(|r| match &r.data {
                RecordData::Cname(target) => Some(target.clone()),
                _ => None,
            })
            .or_else(|| self.cached_cname(&ctx.node));

        match alias {
            Some(target) => self.chase_cname(ctx, target).await,
            None => Err(ResolutionError::NoUsableAnswer),
        }
    }

    /// Resolves the alias target from the root and reports whatever it
    /// finds under the name originally asked for.
    async fn chase_cname(
        &mut self,
        ctx: &ResolutionContext,
        target: Name,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        debug!(from = %ctx.node.name, to = %target, "following CNAME");

        let node = QueryNode::new(target.clone(), ctx.node.type_);
        let sub = ResolutionContext::new(node, self.config.root_server, ctx.depth + 1);
        // A target that cannot be resolved ends the lookup, not only this branch
        let records = self.resolve(sub).await.map_err(|e| {
            if is_lookup_wide(&e) {
                return e;
            }
            warn!(alias = %ctx.node.name, %target, error = %e, "alias target unresolved");
            ResolutionError::AliasUnresolved {
                target,
                source: Box::new(e),
            }
        })?;

        Ok(records
            .iter()
            .map(|r| r.rekeyed(&ctx.node.name, ctx.node.type_))
            .collect())
    }

    async fn follow_referral(
        &mut self,
        ctx: &ResolutionContext,
        message: &Message,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        let glue: Vec<IpAddr> = message
            .additionals
            .iter()
            .filter(|r| r.type_ == RecordType::A)
            .filter_map(|r| r.data.address())
            .unique()
            .collect();

        if !glue.is_empty() {
            return self.try_servers(ctx, glue).await;
        }

        let nameservers: Vec<Name> = message
            .authorities
            .iter()
            .filter_map(|r| match &r.data {
                RecordData::Ns(name) => Some(name.clone()),
                _ => None,
            })
            .unique()
            .collect();

        if nameservers.is_empty() {
            warn!(node = %ctx.node, server = %ctx.server, "dead end: no answer and no referral");
            return Err(ResolutionError::NoNameservers);
        }

        let mut last_error = ResolutionError::UnresolvableNameservers;

        for nameserver in nameservers {
            debug!(%nameserver, "resolving glueless nameserver");

            let node = QueryNode::new(nameserver.clone(), RecordType::A);
            let sub = ResolutionContext::new(node, self.config.root_server, ctx.depth + 1);
            let addresses: Vec<IpAddr> = match self.resolve(sub).await {
                Ok(records) => records
                    .iter()
                    .filter_map(|r| r.data.address())
                    .unique()
                    .collect(),
                Err(e) => {
                    debug!(%nameserver, error = %e, "could not resolve nameserver");
                    if is_limit(&e) {
                        return Err(e);
                    }
                    continue;
                }
            };

            if addresses.is_empty() {
                continue;
            }

            match self.try_servers(ctx, addresses).await {
                Ok(records) => return Ok(records),
                Err(e) if is_lookup_wide(&e) => return Err(e),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    /// Asks each server in turn until one gives a final answer.
    async fn try_servers(
        &mut self,
        ctx: &ResolutionContext,
        servers: Vec<IpAddr>,
    ) -> Result<Vec<ResourceRecord>, ResolutionError> {
        if ctx.referrals >= self.config.max_referrals {
            warn!(node = %ctx.node, "too many referrals");
            return Err(ResolutionError::ReferralLimit(self.config.max_referrals));
        }

        let mut last_error = ResolutionError::NoNameservers;

        for server in servers {
            match self.resolve(ctx.referred_to(server)).await {
                Ok(records) => return Ok(records),
                Err(e) if is_lookup_wide(&e) => return Err(e),
                Err(e) => {
                    debug!(%server, error = %e, "referral led nowhere, trying next server");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Sends the query, resending the identical bytes on timeout, and
    /// decodes the response.
    async fn query(
        &mut self,
        node: &QueryNode,
        server: IpAddr,
    ) -> Result<Message, ResolutionError> {
        let (request, id) = encode_query(node);
        let addr = SocketAddr::new(server, self.config.port);

        for attempt in 0..=self.config.max_retries {
            debug!(id, %node, %server, attempt, "sending query");
            self.tracer.emit(|| TraceEvent::QuerySent {
                id,
                node: node.clone(),
                server,
                attempt,
            });

            let response = match self.exchange(addr, &request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(%addr, attempt, error = %e, "no usable response");
                    continue;
                }
            };

            let message = decode_response(&response)
                .and_then(|message| validate(message, id))
                .map_err(|source| {
                    warn!(%server, error = %source, "discarding response");
                    ResolutionError::Protocol { server, source }
                })?;

            self.tracer.emit(|| TraceEvent::Response {
                server,
                message: message.clone(),
            });

            return Ok(message);
        }

        Err(ResolutionError::Unreachable(addr))
    }

    /// One attempt, bounded by the configured timeout.
    async fn exchange(&self, addr: SocketAddr, request: &[u8]) -> Result<Bytes, TransportError> {
        timeout(self.config.timeout(), self.transport.exchange(addr, request))
            .await
            .unwrap_or(Err(TransportError::Timeout(addr)))
    }

    fn cached_cname(&self, node: &QueryNode) -> Option<Name> {
        if matches!(node.type_, RecordType::Cname | RecordType::Any) {
            return None;
        }

        let alias = QueryNode::new(node.name.clone(), RecordType::Cname);
        self.cache
            .lookup(&alias)
            .into_iter()
            .find_map(|r| match r.data {
                RecordData::Cname(target) => Some(target),
                _ => None,
            })
    }

    fn same_name(&self, a: &Name, b: &Name) -> bool {
        if self.config.normalize_names {
            a.normalized() == b.normalized()
        } else {
            a == b
        }
    }
}

fn validate(message: Message, id: u16) -> Result<Message, ProtocolError> {
    if !message.header.flags.qr() {
        return Err(ProtocolError::NotAResponse);
    }

    if message.id() != id {
        return Err(ProtocolError::IdMismatch {
            expected: id,
            received: message.id(),
        });
    }

    Ok(message)
}

fn is_limit(error: &ResolutionError) -> bool {
    matches!(
        error,
        ResolutionError::IndirectionLimit(_) | ResolutionError::ReferralLimit(_)
    )
}

/// Failures that end the whole lookup; trying another server cannot help.
fn is_lookup_wide(error: &ResolutionError) -> bool {
    is_limit(error) || matches!(error, ResolutionError::AliasUnresolved { .. })
}
