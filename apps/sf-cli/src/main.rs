use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use can_transport as can;
use can_transport::CanBus;
use mit_protocol as mit;

#[derive(Parser, Debug)]
#[command(
    name = "sf",
    version,
    about = "MIT-mode actuator control over CAN",
    disable_help_subcommand = true
)]
struct Cli {
    /// CAN backend
    #[arg(long, value_enum, default_value_t = Backend::Mock, global = true)]
    backend: Backend,
    /// Interface name (e.g. can0) or serial port for SLCAN
    #[arg(long, default_value = "mock0", global = true)]
    device: String,
    /// Bitrate for SLCAN adapters
    #[arg(long, value_enum, global = true)]
    bitrate: Option<Bitrate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    /// In-process bus that echoes MIT commands back as heartbeats
    Mock,
    Slcan,
    /// Linux SocketCAN interface
    Socketcan,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available CAN interfaces
    CanList,
    /// Drive one actuator with a fixed-rate MIT position command
    Run {
        /// Node id of the commanded actuator
        #[arg(long, default_value_t = 1)]
        node: u8,
        /// Command rate in Hz
        #[arg(long, default_value_t = 100.0)]
        rate_hz: f64,
        /// Initial target position (rad)
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        target: f64,
        #[arg(long, default_value_t = 0.5)]
        kp: f64,
        #[arg(long, default_value_t = 0.3)]
        kd: f64,
        /// Device table capacity when no profile is given
        #[arg(long, conflicts_with = "profile")]
        capacity: Option<usize>,
        /// YAML limits profile
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Print telemetry every N sent commands (0 disables)
        #[arg(long, default_value_t = 2)]
        print_every: u32,
        /// Emit telemetry as JSON lines
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Read new targets from stdin, one number per line
        #[arg(long, action = ArgAction::SetTrue)]
        interactive: bool,
        /// Sleep between polling ticks in microseconds
        #[arg(long, default_value_t = 200)]
        idle_us: u64,
        /// Dump Prometheus counters on exit
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
        /// Skip the enable/disable NMT frames around the session
        #[arg(long, action = ArgAction::SetTrue)]
        no_enable: bool,
        /// Set the current position as zero before commanding
        #[arg(long, action = ArgAction::SetTrue)]
        zero: bool,
        /// Stop after this many seconds
        #[arg(long)]
        duration_s: Option<f64>,
    },
    /// Send a single NMT or zero-position frame
    Nmt {
        #[arg(long, default_value_t = 1)]
        node: u8,
        #[arg(value_enum)]
        action: NmtAction,
    },
    /// Encode an MIT command and print the frame
    Encode {
        #[arg(long, default_value_t = 1)]
        node: u8,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pos: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        vel: f64,
        #[arg(long, default_value_t = 0.0)]
        kp: f64,
        #[arg(long, default_value_t = 0.0)]
        kd: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        tor: f64,
        /// YAML limits profile for the command bounds
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Decode a hex payload, e.g. 7FFF800004
    Decode {
        #[arg(value_enum)]
        kind: PayloadKind,
        /// Payload as compact hex
        data: String,
        /// Node whose device limits decode a heartbeat
        #[arg(long, default_value_t = 1)]
        node: u8,
        #[arg(long)]
        profile: Option<PathBuf>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Print received frames, decoding heartbeats
    Sniff {
        /// Number of frames to print
        #[arg(long, default_value_t = 20)]
        count: u32,
        /// Per-frame receive timeout in milliseconds
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
        /// Table capacity for heartbeat decoding
        #[arg(long, default_value_t = mit::DeviceTable::DEFAULT_CAPACITY)]
        capacity: usize,
        /// Give up after this many consecutive timeouts
        #[arg(long, default_value_t = 10)]
        max_timeouts: u32,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum NmtAction {
    Enable,
    Disable,
    Zero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PayloadKind {
    Command,
    Heartbeat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Bitrate {
    #[value(name = "10k")]
    B10k,
    #[value(name = "20k")]
    B20k,
    #[value(name = "50k")]
    B50k,
    #[value(name = "100k")]
    B100k,
    #[value(name = "125k")]
    B125k,
    #[value(name = "250k")]
    B250k,
    #[value(name = "500k")]
    B500k,
    #[value(name = "800k")]
    B800k,
    #[value(name = "1m")]
    B1M,
}

impl Bitrate {
    fn into_transport(self) -> can::SlcanBitrate {
        match self {
            Bitrate::B10k => can::SlcanBitrate::B10k,
            Bitrate::B20k => can::SlcanBitrate::B20k,
            Bitrate::B50k => can::SlcanBitrate::B50k,
            Bitrate::B100k => can::SlcanBitrate::B100k,
            Bitrate::B125k => can::SlcanBitrate::B125k,
            Bitrate::B250k => can::SlcanBitrate::B250k,
            Bitrate::B500k => can::SlcanBitrate::B500k,
            Bitrate::B800k => can::SlcanBitrate::B800k,
            Bitrate::B1M => can::SlcanBitrate::B1M,
        }
    }
}

/// Open the selected backend and bind it to `$bus` for `$body`.
macro_rules! with_bus {
    ($cli:expr, |$bus:ident| $body:expr) => {
        match $cli.backend {
            Backend::Mock => {
                let $bus = can::MockBus::open(&$cli.device)?.with_mit_echo();
                $body
            }
            Backend::Slcan => {
                let br = $cli.bitrate.map(Bitrate::into_transport);
                let $bus = can::SlcanBus::open_with(&$cli.device, br)?;
                $body
            }
            #[cfg(target_os = "linux")]
            Backend::Socketcan => {
                let $bus = can::SocketCanBus::open(&$cli.device)?;
                $body
            }
            #[cfg(not(target_os = "linux"))]
            Backend::Socketcan => bail!("socketcan is only available on Linux"),
        }
    };
}

struct RunArgs {
    node: u8,
    rate_hz: f64,
    target: f64,
    kp: f64,
    kd: f64,
    capacity: Option<usize>,
    profile: Option<PathBuf>,
    print_every: u32,
    json: bool,
    interactive: bool,
    idle_us: u64,
    metrics: bool,
    no_enable: bool,
    zero: bool,
    duration_s: Option<f64>,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::CanList => can_list(cli.backend),
        Commands::Run {
            node,
            rate_hz,
            target,
            kp,
            kd,
            capacity,
            ref profile,
            print_every,
            json,
            interactive,
            idle_us,
            metrics,
            no_enable,
            zero,
            duration_s,
        } => {
            let args = RunArgs {
                node,
                rate_hz,
                target,
                kp,
                kd,
                capacity,
                profile: profile.clone(),
                print_every,
                json,
                interactive,
                idle_us,
                metrics,
                no_enable,
                zero,
                duration_s,
            };
            with_bus!(cli, |bus| run_with(bus, &args))
        }
        Commands::Nmt { node, action } => {
            check_node(node)?;
            let frame = match action {
                NmtAction::Enable => mit::NmtCommand::Enable.to_frame(node),
                NmtAction::Disable => mit::NmtCommand::Disable.to_frame(node),
                NmtAction::Zero => mit::zero_position_frame(node),
            };
            with_bus!(cli, |bus| send_one(bus, &frame))
        }
        Commands::Encode {
            node,
            pos,
            vel,
            kp,
            kd,
            tor,
            ref profile,
        } => {
            check_node(node)?;
            let limits = load_profile(profile.as_ref())?.command_limits;
            let cmd = mit::MitCommand {
                pos,
                vel,
                kp,
                kd,
                tor,
            };
            println!("{}", cmd.to_frame(node, &limits));
            Ok(())
        }
        Commands::Decode {
            kind,
            ref data,
            node,
            ref profile,
            json,
        } => {
            let profile = load_profile(profile.as_ref())?;
            let out = decode_payload(kind, &parse_hex_compact(data)?, node, &profile)?;
            if json {
                println!("{out}");
            } else if let Some(fields) = out.as_object() {
                for (k, v) in fields {
                    println!("{k}\t{v}");
                }
            }
            Ok(())
        }
        Commands::Sniff {
            count,
            timeout_ms,
            capacity,
            max_timeouts,
        } => {
            let table = mit::DeviceTable::new(capacity, mit::MitLimits::DEFAULT)?;
            let limits = SniffLimits {
                count,
                timeout_ms,
                max_timeouts,
            };
            let seen = with_bus!(cli, |bus| sniff(bus, table, limits))?;
            info!(seen, "sniff finished");
            Ok(())
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn can_list(backend: Backend) -> Result<()> {
    let buses = match backend {
        Backend::Mock => can::MockBus::list()?,
        Backend::Slcan => can::SlcanBus::list()?,
        #[cfg(target_os = "linux")]
        Backend::Socketcan => can::SocketCanBus::list()?,
        #[cfg(not(target_os = "linux"))]
        Backend::Socketcan => bail!("socketcan is only available on Linux"),
    };
    for bus in buses {
        println!("{}\t{}", bus.name, bus.driver);
    }
    Ok(())
}

fn check_node(node: u8) -> Result<()> {
    if node == 0 || node > mit::ident::MAX_NODE_ID {
        bail!("node id {node} outside 1..={}", mit::ident::MAX_NODE_ID);
    }
    Ok(())
}

fn load_profile(path: Option<&PathBuf>) -> Result<mit::Profile> {
    match path {
        Some(p) => mit::load_profile_file(p),
        None => Ok(mit::Profile::default()),
    }
}

fn send_one<B: CanBus>(mut bus: B, frame: &can::CanFrame) -> Result<()> {
    bus.send(frame)?;
    println!("{frame}");
    Ok(())
}

fn run_with<B: CanBus>(bus: B, args: &RunArgs) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    run_session(bus, args, &running)?;
    Ok(())
}

/// One control session: enable, loop until `running` clears or the deadline
/// passes, disable. Hands the bus back when done.
fn run_session<B: CanBus>(mut bus: B, args: &RunArgs, running: &AtomicBool) -> Result<B> {
    let deadline = session_deadline(Instant::now(), args.duration_s)?;
    let heartbeats = can::CanFilter {
        id: mit::compose(mit::FunctionCode::Heartbeat, 0),
        mask: u32::from(mit::ident::FUNCTION_MASK),
    };
    match bus.set_filters(&[heartbeats]) {
        Ok(()) => debug!("receive filtered to heartbeats"),
        Err(can::TransportError::Unsupported(_)) => {}
        Err(e) => warn!(error = %e, "could not set receive filters"),
    }

    let mut profile = load_profile(args.profile.as_ref())?;
    if let Some(capacity) = args.capacity {
        profile.table = mit::DeviceTable::new(capacity, mit::MitLimits::DEFAULT)?;
    }
    let settings = mit::LoopSettings {
        target_node: args.node,
        kp: args.kp,
        kd: args.kd,
        initial_target: args.target,
        command_limits: profile.command_limits,
        ..Default::default()
    }
    .with_rate_hz(args.rate_hz)?;

    let hub = if args.metrics {
        Some(mit::MetricsHub::new().context("registering metrics")?)
    } else {
        None
    };
    let mut ctl = mit::ControlLoop::new(bus, profile.table, settings)?;
    if let Some(h) = &hub {
        ctl = ctl.with_metrics(h.clone());
    }

    if args.interactive {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_stdin_reader(tx);
        ctl = ctl.with_target_channel(rx);
        eprintln!("enter target positions, one per line");
    }

    if !args.no_enable {
        ctl.enable()?;
    }
    if args.zero {
        ctl.zero_position()?;
    }

    let node = args.node;
    let mut sent = 0u64;
    ctl.run(
        Duration::from_micros(args.idle_us),
        running,
        |report, table| {
            if let Some(cmd) = report.sent() {
                sent += 1;
                if args.print_every > 0 && sent % u64::from(args.print_every) == 0 {
                    if let Some(state) = table.get(node) {
                        print_telemetry(node, cmd, state, args.json);
                    }
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                running.store(false, Ordering::SeqCst);
            }
        },
    );
    info!(sent, "session finished");
    for (node_id, m) in ctl.table().iter() {
        debug!(node_id, pos = m.pos(), vel = m.vel(), tor = m.tor(), "final state");
    }

    if !args.no_enable {
        if let Err(e) = ctl.disable() {
            warn!(error = %e, "failed to disable motor on exit");
        }
    }
    if let Some(h) = &hub {
        print!("{}", h.encode_text());
    }
    let (bus, _) = ctl.into_parts();
    Ok(bus)
}

/// Absolute end of a session lasting `duration_s` seconds from `now`.
fn session_deadline(now: Instant, duration_s: Option<f64>) -> Result<Option<Instant>> {
    let Some(secs) = duration_s else {
        return Ok(None);
    };
    if !secs.is_finite() || secs <= 0.0 {
        bail!("duration must be a positive number of seconds");
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|d| now.checked_add(d))
        .map(Some)
        .with_context(|| format!("duration {secs}s out of range"))
}

fn spawn_stdin_reader(tx: Sender<f64>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            match parse_target(text) {
                Ok(v) => {
                    if tx.send(v).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(input = text, error = %e, "ignoring target"),
            }
        }
    });
}

fn parse_target(text: &str) -> Result<f64> {
    let v: f64 = text
        .parse()
        .with_context(|| format!("not a number: '{text}'"))?;
    if !v.is_finite() {
        bail!("target must be finite");
    }
    Ok(v)
}

fn print_telemetry(node: u8, cmd: &mit::MitCommand, state: &mit::MotorState, json: bool) {
    if json {
        let rec = mit::TelemetryRecord::capture(
            node,
            cmd,
            state,
            Some(time::OffsetDateTime::now_utc()),
        );
        match rec.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "telemetry encode failed"),
        }
    } else {
        println!(
            "node={node}\tcmd={:.4}\tpos={:.4}\tvel={:.4}\ttor={:.4}",
            cmd.pos,
            state.pos(),
            state.vel(),
            state.tor()
        );
    }
}

/// Field values of a command or heartbeat payload. Heartbeats decode with the
/// device limits of `node`, commands with the profile's command limits.
fn decode_payload(
    kind: PayloadKind,
    data: &[u8],
    node: u8,
    profile: &mit::Profile,
) -> Result<serde_json::Value> {
    let out = match kind {
        PayloadKind::Command => {
            let cmd = mit::MitCommand::decode(data, &profile.command_limits)
                .with_context(|| format!("command needs {} bytes", mit::MIT_PAYLOAD_LEN))?;
            serde_json::json!({
                "pos": cmd.pos, "vel": cmd.vel, "kp": cmd.kp, "kd": cmd.kd, "tor": cmd.tor,
            })
        }
        PayloadKind::Heartbeat => {
            let codes = mit::unpack_heartbeat(data)
                .with_context(|| format!("heartbeat needs {} bytes", mit::HEARTBEAT_MIN_LEN))?;
            let l = profile
                .table
                .get(node)
                .map(|m| *m.limits())
                .with_context(|| {
                    format!("node {node} outside table capacity {}", profile.table.capacity())
                })?;
            serde_json::json!({
                "pos": mit::codec::decode(codes.pos, l.pos),
                "vel": mit::codec::decode(codes.vel, l.vel),
                "tor": mit::codec::decode(codes.tor, l.tor),
            })
        }
    };
    Ok(out)
}

#[derive(Clone, Copy, Debug)]
struct SniffLimits {
    count: u32,
    timeout_ms: u64,
    max_timeouts: u32,
}

/// Print up to `count` frames; returns how many were seen. Stops early after
/// `max_timeouts` consecutive receive timeouts.
fn sniff<B: CanBus>(mut bus: B, mut table: mit::DeviceTable, limits: SniffLimits) -> Result<u32> {
    let mut seen = 0;
    let mut idle = 0;
    while seen < limits.count {
        let frame = match bus.recv(Some(limits.timeout_ms)) {
            Ok(f) => f,
            Err(can::TransportError::Timeout) => {
                idle += 1;
                if idle >= limits.max_timeouts {
                    warn!(timeouts = idle, seen, "bus silent, stopping");
                    break;
                }
                debug!(timeout_ms = limits.timeout_ms, "no frame");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        idle = 0;
        seen += 1;
        print_frame(&frame);
        if let mit::Disposition::Applied { node_id } = table.apply_frame(&frame) {
            if let Some(m) = table.get(node_id) {
                println!(
                    "\theartbeat node={node_id} pos={:.4} vel={:.4} tor={:.4}",
                    m.pos(),
                    m.vel(),
                    m.tor()
                );
            }
        }
    }
    Ok(seen)
}

fn print_frame(f: &can::CanFrame) {
    let ts = f
        .timestamp
        .as_ref()
        .and_then(|t| t.rfc3339())
        .unwrap_or_default();
    let (base, _) = mit::classify(f.id.raw() as u16);
    let function = mit::FunctionCode::from_base(base)
        .filter(|_| !f.id.is_extended())
        .map(|fc| fc.name())
        .unwrap_or("-");
    println!("{ts}\t{f}\t{function}");
}

fn parse_hex_compact(s: &str) -> Result<Vec<u8>> {
    let t: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if t.len() % 2 != 0 {
        bail!("odd hex length");
    }
    (0..t.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&t[i..i + 2], 16).map_err(|e| anyhow::anyhow!("invalid hex: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_compact() {
        assert_eq!(parse_hex_compact("7FFF 8000").unwrap(), vec![0x7F, 0xFF, 0x80, 0x00]);
        assert!(parse_hex_compact("7FF").is_err());
        assert!(parse_hex_compact("zz").is_err());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("-1.25").unwrap(), -1.25);
        assert!(parse_target("abc").is_err());
        assert!(parse_target("inf").is_err());
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "sf", "--backend", "mock", "run", "--node", "2", "--rate-hz", "200", "--target",
            "-0.5", "--json",
        ])
        .unwrap();
        assert_eq!(cli.backend, Backend::Mock);
        match cli.command {
            Commands::Run {
                node,
                rate_hz,
                target,
                json,
                print_every,
                ..
            } => {
                assert_eq!((node, rate_hz, target, json, print_every), (2, 200.0, -0.5, true, 2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_capacity_conflicts_with_profile() {
        let res = Cli::try_parse_from(["sf", "run", "--capacity", "4", "--profile", "p.yaml"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_node_bounds() {
        assert!(check_node(0).is_err());
        assert!(check_node(1).is_ok());
        assert!(check_node(127).is_ok());
        assert!(check_node(128).is_err());
    }

    fn run_args() -> RunArgs {
        RunArgs {
            node: 1,
            rate_hz: 1000.0,
            target: 0.2,
            kp: 0.5,
            kd: 0.3,
            capacity: None,
            profile: None,
            print_every: 0,
            json: false,
            interactive: false,
            idle_us: 100,
            metrics: false,
            no_enable: false,
            zero: false,
            duration_s: Some(0.02),
        }
    }

    #[test]
    fn test_mock_run_session_enables_and_disables() {
        let running = AtomicBool::new(true);
        let bus = can::MockBus::new("mock0").with_mit_echo();
        let mut bus = run_session(bus, &run_args(), &running).unwrap();
        let sent = bus.take_sent();

        let (first, rest) = sent.split_first().unwrap();
        let (last, middle) = rest.split_last().unwrap();
        assert_eq!((first.id.raw(), first.data[7]), (0x001, 0xFC));
        assert_eq!((last.id.raw(), last.data[7]), (0x001, 0xFD));
        assert!(!middle.is_empty());
        assert!(middle.iter().all(|f| f.id.raw() == 0x201 && f.len == 8));
    }

    #[test]
    fn test_run_session_rejects_oversized_capacity() {
        let running = AtomicBool::new(true);
        let args = RunArgs {
            capacity: Some(300),
            ..run_args()
        };
        assert!(run_session(can::MockBus::new("mock0"), &args, &running).is_err());
    }

    #[test]
    fn test_session_deadline_bounds() {
        let now = Instant::now();
        assert_eq!(session_deadline(now, None).unwrap(), None);
        assert_eq!(
            session_deadline(now, Some(0.5)).unwrap(),
            Some(now + Duration::from_millis(500))
        );
        assert!(session_deadline(now, Some(1e30)).is_err());
        assert!(session_deadline(now, Some(f64::INFINITY)).is_err());
        assert!(session_deadline(now, Some(f64::NAN)).is_err());
        assert!(session_deadline(now, Some(-1.0)).is_err());
        assert!(session_deadline(now, Some(0.0)).is_err());
    }

    #[test]
    fn test_decode_heartbeat_uses_node_limits() {
        let yaml = "devices:\n  - node_id: 2\n    pos: [-12.5, 12.5]\n";
        let profile = mit::parse_profile(yaml).unwrap();
        let data = [0x00, 0xFF, 0xFF, 0x80, 0x08, 0x00];
        let pos = |node| {
            decode_payload(PayloadKind::Heartbeat, &data, node, &profile)
                .unwrap()["pos"]
                .as_f64()
                .unwrap()
        };
        assert!((pos(2) - 12.5).abs() < 1e-9);
        assert!((pos(1) - 3.14).abs() < 1e-9);
        assert!(decode_payload(PayloadKind::Heartbeat, &data, 9, &profile).is_err());
        assert!(decode_payload(PayloadKind::Heartbeat, &data[..3], 1, &profile).is_err());
    }

    #[test]
    fn test_sniff_stops_on_silent_bus() {
        let mut bus = can::MockBus::new("mock0");
        let id = can::CanId::standard(0x781).unwrap();
        bus.push_inbound(can::CanFrame::new(id, &[0x01, 0x80, 0x00, 0x80, 0x08, 0x00]).unwrap());
        bus.push_inbound(can::CanFrame::new(id, &[0x01, 0x7F, 0xFF, 0x80, 0x08, 0x00]).unwrap());
        let limits = SniffLimits {
            count: 5,
            timeout_ms: 1,
            max_timeouts: 3,
        };
        assert_eq!(sniff(bus, mit::DeviceTable::default(), limits).unwrap(), 2);
    }
}
