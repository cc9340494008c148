use std::collections::BTreeMap;
use std::io::Write;
use std::net::IpAddr;
use std::time::Instant;

use dnslookup::{
    Cache, Name, ProtocolError, QueryNode, RecordType, Resolver, ResourceRecord, Section,
    TraceEvent, Transport,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

const PROMPT: &str = "DNSLOOKUP> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lookup { name: Name, type_: RecordType },
    Trace(bool),
    Server(IpAddr),
    Dump,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error(
        "Invalid command. Valid commands are:\n\tlookup fqdn [type]\n\ttrace on|off\n\tserver IP\n\tdump\n\tquit"
    )]
    Unknown,

    #[error("Invalid call. Format:\n\tlookup hostName [type]")]
    LookupUsage,

    #[error("Invalid query type. Must be one of:\n\tA, AAAA, NS, MX, CNAME, SOA, SRV, ANY")]
    QueryType,

    #[error("Invalid host name ({0}).")]
    HostName(ProtocolError),

    #[error("Invalid call. Format:\n\ttrace on|off")]
    TraceUsage,

    #[error("Invalid call. Format:\n\tserver IP")]
    ServerUsage,

    #[error("Invalid root server ({0}).")]
    RootServer(String),
}

/// Parses one input line. Blank lines and comments give `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.split('#').next().unwrap_or_default();
    let args: Vec<&str> = line.split_whitespace().collect();

    let Some((keyword, rest)) = args.split_first() else {
        return Ok(None);
    };

    let command = match keyword.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Command::Quit,
        "dump" => Command::Dump,
        "lookup" | "l" => {
            let (name, type_) = match rest {
                [name] => (*name, RecordType::A),
                [name, type_] => (
                    *name,
                    type_.parse().map_err(|_| CommandError::QueryType)?,
                ),
                _ => return Err(CommandError::LookupUsage),
            };
            let name = Name::new(name).map_err(CommandError::HostName)?;
            Command::Lookup { name, type_ }
        }
        "trace" => match rest {
            [setting] if setting.eq_ignore_ascii_case("on") => Command::Trace(true),
            [setting] if setting.eq_ignore_ascii_case("off") => Command::Trace(false),
            _ => return Err(CommandError::TraceUsage),
        },
        "server" => match rest {
            [addr] => Command::Server(
                addr.parse()
                    .map_err(|e: std::net::AddrParseError| CommandError::RootServer(e.to_string()))?,
            ),
            _ => return Err(CommandError::ServerUsage),
        },
        _ => return Err(CommandError::Unknown),
    };

    Ok(Some(command))
}

/// Result lines for one lookup, printed under the name and type asked for.
pub fn format_results(node: &QueryNode, records: &[ResourceRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec![format!(
            "{:30} {:5} {:<8} {}",
            node.name, node.type_, -1, "0.0.0.0"
        )];
    }

    records
        .iter()
        .map(|r| format!("{:30} {:5} {:<8} {}", node.name, node.type_, r.ttl, r.data))
        .collect()
}

fn format_trace_record(record: &ResourceRecord) -> String {
    format!(
        "       {:30} {:<10} {:4} {}",
        record.name, record.ttl, record.type_, record.data
    )
}

pub fn format_event(event: &TraceEvent) -> Vec<String> {
    match event {
        TraceEvent::QuerySent {
            id, node, server, ..
        } => vec![
            String::new(),
            String::new(),
            format!("Query ID     {id} {}  {} --> {server}", node.name, node.type_),
        ],
        TraceEvent::Response { message, .. } => {
            let mut lines = vec![format!(
                "Response ID: {} Authoritative = {}",
                message.id(),
                message.is_authoritative()
            )];
            for section in Section::ALL {
                let records = message.section(section);
                lines.push(format!("  {} ({})", section.title(), records.len()));
                lines.extend(records.iter().map(format_trace_record));
            }
            lines
        }
        TraceEvent::Failed { node, reason } => vec![format!("Lookup of {node} failed: {reason}")],
    }
}

/// Live cache contents grouped by name and type, in sorted order.
pub fn format_dump(cache: &Cache, now: Instant) -> Vec<String> {
    let mut live: BTreeMap<QueryNode, Vec<ResourceRecord>> = BTreeMap::new();

    cache.for_each(|node, records| {
        let mut records: Vec<ResourceRecord> = records
            .iter()
            .filter(|r| !r.is_expired_at(now))
            .cloned()
            .collect();
        if records.is_empty() {
            return;
        }
        records.sort_by_cached_key(|r| r.data.to_string());
        live.entry(node.clone()).or_default().extend(records);
    });

    live.iter()
        .flat_map(|(node, records)| format_results(node, records))
        .collect()
}

pub struct Shell<T, W> {
    resolver: Resolver<T>,
    events: UnboundedReceiver<TraceEvent>,
    out: W,
    interactive: bool,
}

impl<T: Transport, W: Write> Shell<T, W> {
    /// `interactive` decides whether the prompt is shown.
    pub fn new(mut resolver: Resolver<T>, out: W, interactive: bool) -> Self {
        let events = resolver.subscribe();
        Self {
            resolver,
            events,
            out,
            interactive,
        }
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(self.out, "Root DNS server is: {}", self.resolver.root_server())?;

        let mut lines = input.lines();
        loop {
            if self.interactive {
                write!(self.out, "{PROMPT}")?;
                self.out.flush()?;
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_command(&line) {
                Ok(None) => continue,
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Err(e) => eprintln!("{e}"),
            }
        }

        writeln!(self.out, "Goodbye!")
    }

    pub async fn execute(&mut self, command: Command) -> std::io::Result<()> {
        debug!(?command, "executing");

        match command {
            Command::Lookup { name, type_ } => {
                let node = QueryNode::new(name.clone(), type_);
                // A failure has already been logged and traced; it prints as empty
                let records = self.resolver.lookup(name, type_).await.unwrap_or_default();
                self.print_trace()?;
                for line in format_results(&node, &records) {
                    writeln!(self.out, "{line}")?;
                }
            }
            Command::Trace(verbose) => {
                self.resolver.set_verbose(verbose);
                let state = if verbose { "ON" } else { "OFF" };
                writeln!(self.out, "Verbose tracing is now: {state}")?;
            }
            Command::Server(root_server) => {
                self.resolver.set_root_server(root_server);
                writeln!(self.out, "Root DNS server is now: {root_server}")?;
            }
            Command::Dump => {
                for line in format_dump(self.resolver.cache(), Instant::now()) {
                    writeln!(self.out, "{line}")?;
                }
            }
            Command::Quit => {}
        }

        Ok(())
    }

    fn print_trace(&mut self) -> std::io::Result<()> {
        while let Ok(event) = self.events.try_recv() {
            for line in format_event(&event) {
                writeln!(self.out, "{line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use dnslookup::{Flags, Header, Message, RecordData, ResolverConfig};

    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn a(owner: &str, ttl: u32, addr: [u8; 4]) -> ResourceRecord {
        ResourceRecord::new(name(owner), RecordType::A, ttl, RecordData::A(addr.into()))
    }

    #[test]
    fn lookup_defaults_to_a() {
        assert_eq!(
            parse_command("lookup www.example.com").unwrap(),
            Some(Command::Lookup {
                name: name("www.example.com"),
                type_: RecordType::A
            })
        );
        assert_eq!(
            parse_command("  L example.com mx  ").unwrap(),
            Some(Command::Lookup {
                name: name("example.com"),
                type_: RecordType::Mx
            })
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# nothing here").unwrap(), None);
        assert_eq!(parse_command("dump # and the rest").unwrap(), Some(Command::Dump));
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(parse_command("QUIT").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("Trace ON").unwrap(), Some(Command::Trace(true)));
        assert_eq!(parse_command("trace off").unwrap(), Some(Command::Trace(false)));
    }

    #[test]
    fn server_needs_an_ip_address() {
        assert_eq!(
            parse_command("server 199.7.83.42").unwrap(),
            Some(Command::Server(IpAddr::V4(Ipv4Addr::new(199, 7, 83, 42))))
        );
        assert!(matches!(
            parse_command("server a.root-servers.net"),
            Err(CommandError::RootServer(_))
        ));
        assert_eq!(parse_command("server"), Err(CommandError::ServerUsage));
    }

    #[test]
    fn bad_input_is_reported() {
        assert_eq!(parse_command("resolve x"), Err(CommandError::Unknown));
        assert_eq!(parse_command("lookup"), Err(CommandError::LookupUsage));
        assert_eq!(parse_command("lookup a b c"), Err(CommandError::LookupUsage));
        assert_eq!(parse_command("lookup a.com TXT"), Err(CommandError::QueryType));
        assert_eq!(parse_command("trace maybe"), Err(CommandError::TraceUsage));
        assert!(matches!(
            parse_command("lookup a..com"),
            Err(CommandError::HostName(_))
        ));
    }

    #[test]
    fn results_are_printed_in_columns() {
        let node = QueryNode::new(name("www.example.com"), RecordType::A);
        let lines = format_results(&node, &[a("www.example.com", 300, [93, 184, 216, 34])]);

        assert_eq!(
            lines,
            [format!(
                "{:30} {:5} {:8} {}",
                "www.example.com", "A", "300", "93.184.216.34"
            )]
        );
    }

    #[test]
    fn empty_result_prints_a_placeholder() {
        let node = QueryNode::new(name("nope.example.com"), RecordType::Aaaa);
        let lines = format_results(&node, &[]);

        assert_eq!(
            lines,
            [format!("{:30} {:5} {:8} {}", "nope.example.com", "AAAA", "-1", "0.0.0.0")]
        );
    }

    #[test]
    fn query_event_layout() {
        let event = TraceEvent::QuerySent {
            id: 4321,
            node: QueryNode::new(name("example.com"), RecordType::Ns),
            server: IpAddr::V4(Ipv4Addr::new(198, 41, 0, 4)),
            attempt: 0,
        };

        assert_eq!(
            format_event(&event),
            ["", "", "Query ID     4321 example.com  NS --> 198.41.0.4"]
        );
    }

    #[test]
    fn response_event_lists_every_section() {
        let mut flags = Flags::default();
        flags.set_qr(true);
        let mut message = Message::new(Header::new(77, flags));
        message.add_additional(a("ns.example.com", 3600, [192, 0, 2, 53]));

        let event = TraceEvent::Response {
            server: IpAddr::V4(Ipv4Addr::new(192, 5, 6, 30)),
            message,
        };
        let lines = format_event(&event);

        assert_eq!(lines[0], "Response ID: 77 Authoritative = false");
        assert_eq!(lines[1], "  Answers (0)");
        assert_eq!(lines[2], "  Nameservers (0)");
        assert_eq!(lines[3], "  Additional Information (1)");
        assert_eq!(
            lines[4],
            format!("       {:30} {:10} {:4} {}", "ns.example.com", "3600", "A", "192.0.2.53")
        );
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn dump_skips_expired_records_and_sorts() {
        let mut cache = Cache::new(true);
        cache.insert(a("b.example", 60, [192, 0, 2, 2]));
        cache.insert(a("a.example", 60, [192, 0, 2, 1]));
        cache.insert(a("gone.example", 1, [192, 0, 2, 3]));

        let later = Instant::now() + Duration::from_secs(2);
        let lines = format_dump(&cache, later);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a.example "));
        assert!(lines[1].starts_with("b.example "));
    }

    #[tokio::test]
    async fn shell_toggles_settings_and_says_goodbye() {
        let resolver = Resolver::new(ResolverConfig::default());
        let mut out = Vec::new();
        let mut shell = Shell::new(resolver, &mut out, false);

        let input: &[u8] = b"trace on\nserver 192.0.2.1\nbogus\ndump\nquit\nlookup never.example\n";
        shell.run(input).await.unwrap();
        assert!(shell.resolver.verbose());
        assert_eq!(
            shell.resolver.root_server(),
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))
        );
        drop(shell);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "Root DNS server is: 198.41.0.4\n\
             Verbose tracing is now: ON\n\
             Root DNS server is now: 192.0.2.1\n\
             Goodbye!\n"
        );
    }
}
