//! Line-oriented transport to a simulator process.
//!
//! The simulator reports on stdout. Commit-log lines are retired
//! instructions, `mmio` lines are external MMIO requests answered on its
//! stdin, and anything else is program output forwarded to stderr.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;

use tandem_verify::{PacketSink, VerificationPacket, parse_commit_line};
use tracing::{debug, info, warn};

use super::socket::SocketGuard;
use crate::mmio::{ExternalMmio, parse_mmio_line};
use crate::perf::RunCounters;
use crate::proc::{Launch, ProcControl, ProcEvent, VerificationPacketConfig};
use crate::{PlatformError, Result};

/// Simulator command line. Workload arguments are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SimCommand {
    /// Split a whitespace-separated command string.
    pub fn parse(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = PathBuf::from(words.next()?);
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

struct Running {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

/// [`ProcControl`] speaking to a simulator child process.
pub struct SimProcControl {
    command: SimCommand,
    socket: SocketGuard,
    counters: Arc<RunCounters>,
    config: VerificationPacketConfig,
    sink: Option<Arc<dyn PacketSink>>,
    mmio: Option<Box<dyn ExternalMmio>>,
    running: Option<Running>,
    tohost: u64,
    ignored: u64,
    skipped: u64,
    line: String,
}

impl SimProcControl {
    pub fn new(command: SimCommand, socket: SocketGuard, counters: Arc<RunCounters>) -> Self {
        Self {
            command,
            socket,
            counters,
            config: VerificationPacketConfig::default(),
            sink: None,
            mmio: None,
            running: None,
            tohost: 0,
            ignored: 0,
            skipped: 0,
            line: String::new(),
        }
    }

    pub fn config(&self) -> VerificationPacketConfig {
        self.config
    }

    fn deliver(&mut self, mut packet: VerificationPacket) {
        self.counters.record_instruction();
        if self.ignored < self.config.packets_to_ignore {
            self.ignored += 1;
            self.skipped += 1;
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        if self.config.synchronization_packets {
            packet.skipped = std::mem::take(&mut self.skipped);
        }
        sink.accept(&packet);
        self.counters.record_packet();
    }

    fn answer_mmio(&mut self, line: &str) -> Result<bool> {
        let Some(req) = parse_mmio_line(line) else {
            return Ok(false);
        };
        self.counters.record_mmio();
        let resp = match self.mmio.as_mut() {
            Some(mmio) => mmio.request(req),
            None => {
                warn!(addr = format_args!("{:#x}", req.addr), "mmio request with no bridge attached");
                crate::mmio::MmioResponse {
                    data: 0,
                    mapped: false,
                }
            }
        };
        self.send(&format!("{:#x}\n", resp.data))?;
        Ok(true)
    }

    fn send(&mut self, msg: &str) -> Result<()> {
        let stdin = self
            .running
            .as_mut()
            .and_then(|r| r.stdin.as_mut())
            .ok_or(PlatformError::NotStarted)?;
        stdin.write_all(msg.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    fn wait_exit(&mut self) -> Result<ProcEvent> {
        let running = self.running.as_mut().ok_or(PlatformError::NotStarted)?;
        running.stdin = None;
        let status = running.child.wait()?;
        let code = status.code().unwrap_or(1);
        info!(code, "simulator exited");
        Ok(ProcEvent::Halted(code))
    }
}

impl ProcControl for SimProcControl {
    fn configure_verification_packets(&mut self, config: VerificationPacketConfig) {
        debug!(
            packets_to_ignore = config.packets_to_ignore,
            synchronization = config.synchronization_packets,
            "verification packet configuration"
        );
        self.config = config;
        self.ignored = 0;
        self.skipped = 0;
    }

    fn attach_packet_sink(&mut self, sink: Arc<dyn PacketSink>) {
        self.sink = Some(sink);
    }

    fn attach_mmio(&mut self, mmio: Box<dyn ExternalMmio>) {
        self.mmio = Some(mmio);
    }

    fn start(&mut self, launch: &Launch) -> Result<()> {
        if self.running.is_some() {
            return Err(PlatformError::AlreadyStarted);
        }
        info!(
            program = %self.command.program.display(),
            entry = format_args!("{:#x}", launch.entry),
            tohost = format_args!("{:#x}", launch.tohost),
            "starting simulator"
        );

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        // An explicitly configured socket name wins.
        for (name, value) in self.socket.env() {
            if std::env::var_os(name).is_none() {
                cmd.env(name, value);
            }
        }
        let mut child = cmd.spawn().map_err(|source| PlatformError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or(PlatformError::NotStarted)?;

        self.tohost = launch.tohost;
        self.running = Some(Running {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        });
        Ok(())
    }

    fn poll(&mut self) -> Result<ProcEvent> {
        let running = self.running.as_mut().ok_or(PlatformError::NotStarted)?;
        self.line.clear();
        if running.stdout.read_line(&mut self.line)? == 0 {
            return self.wait_exit();
        }
        let line = std::mem::take(&mut self.line);

        if let Some(packet) = parse_commit_line(&line) {
            let tohost = packet.store_to(self.tohost).filter(|&v| v != 0);
            self.deliver(packet);
            self.line = line;
            return Ok(tohost.map_or(ProcEvent::Progress, ProcEvent::ToHost));
        }
        if !self.answer_mmio(&line)? {
            eprint!("{line}");
        }
        self.line = line;
        Ok(ProcEvent::Progress)
    }

    fn set_fromhost(&mut self, value: u64) -> Result<()> {
        self.send(&format!("fromhost {value:#x}\n"))
    }

    fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.stdin = None;
            if matches!(running.child.try_wait(), Ok(None)) {
                let _ = running.child.kill();
            }
            let _ = running.child.wait();
        }
    }
}

impl Drop for SimProcControl {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SimProcControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimProcControl")
            .field("command", &self.command)
            .field("config", &self.config)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<VerificationPacket>>);

    impl PacketSink for Recorder {
        fn accept(&self, packet: &VerificationPacket) {
            self.0.lock().unwrap().push(packet.clone());
        }
    }

    const SCRIPT: &str = "\
echo 'core   0: 3 0x0000000080000000 (0x00000297) x5  0x0000000080000000'
echo 'hello from the target'
echo 'core   0: 3 0x0000000080000004 (0x00000013)'
echo 'mmio rd 0x60000008 4'
read reply
echo \"got $reply\" >&2
echo 'core   0: 3 0x0000000080000008 (0x00b52023) mem 0x0000000080001000 0x0000000000000001'
exit 3
";

    fn sh(script: &str) -> SimProcControl {
        let dir = std::env::temp_dir().join(format!("tandem-sim-{}", std::process::id()));
        let command = SimCommand {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "dut".to_string()],
        };
        SimProcControl::new(command, SocketGuard::new(dir), RunCounters::new())
    }

    fn launch() -> Launch {
        Launch {
            entry: 0x8000_0000,
            tohost: 0x8000_1000,
            fromhost: 0x8000_1008,
            args: vec!["prog.elf".to_string()],
        }
    }

    fn drain(dut: &mut SimProcControl) -> Vec<ProcEvent> {
        let mut events = Vec::new();
        loop {
            let event = dut.poll().unwrap();
            events.push(event);
            if matches!(event, ProcEvent::Halted(_)) {
                return events;
            }
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = SimCommand::parse("spike --log-commits  -l").unwrap();
        assert_eq!(cmd.program, PathBuf::from("spike"));
        assert_eq!(cmd.args, ["--log-commits", "-l"]);
        assert!(SimCommand::parse("   ").is_none());
    }

    #[test]
    fn test_poll_before_start_fails() {
        let mut dut = sh("true");
        assert!(matches!(dut.poll(), Err(PlatformError::NotStarted)));
    }

    #[test]
    fn test_events_from_simulator() {
        let recorder = Arc::new(Recorder::default());
        let mut dut = sh(SCRIPT);
        dut.attach_packet_sink(recorder.clone());
        dut.attach_mmio(Box::new(crate::mmio::ConsoleMmio::new(Box::new(std::io::sink()))));
        dut.start(&launch()).unwrap();

        let events = drain(&mut dut);
        assert!(events.contains(&ProcEvent::ToHost(1)));
        assert_eq!(events.last(), Some(&ProcEvent::Halted(3)));

        let packets = recorder.0.lock().unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].pc, 0x8000_0000);
        assert_eq!(packets[2].store_to(0x8000_1000), Some(1));
        assert_eq!(dut.counters.instret(), 3);
        assert_eq!(dut.counters.mmio_requests(), 1);
    }

    #[test]
    fn test_disabled_config_delivers_nothing() {
        let recorder = Arc::new(Recorder::default());
        let mut dut = sh(SCRIPT);
        dut.configure_verification_packets(VerificationPacketConfig::DISABLED);
        dut.attach_packet_sink(recorder.clone());
        dut.start(&launch()).unwrap();

        let events = drain(&mut dut);
        // tohost is still observed with tagging off.
        assert!(events.contains(&ProcEvent::ToHost(1)));
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(dut.counters.packets(), 0);
    }

    #[test]
    fn test_ignored_packets_reported_as_skipped() {
        let recorder = Arc::new(Recorder::default());
        let mut dut = sh(SCRIPT);
        dut.configure_verification_packets(VerificationPacketConfig {
            packets_to_ignore: 2,
            synchronization_packets: true,
        });
        dut.attach_packet_sink(recorder.clone());
        dut.start(&launch()).unwrap();
        drain(&mut dut);

        let packets = recorder.0.lock().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].skipped, 2);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut dut = sh("sleep 5");
        dut.start(&launch()).unwrap();
        assert!(matches!(
            dut.start(&launch()),
            Err(PlatformError::AlreadyStarted)
        ));
        dut.stop();
    }
}
