//! Recording mock backend for orchestrator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tandem_image::testing::ElfBuilder;
use tandem_platform::sim::SimPlatform;
use tandem_platform::{
    Backend, ClockControl, ClockGrant, ExternalMmio, Launch, MemoryRegion, MmioRequest,
    MmioResponse, PerfMonitor, PerformanceReport, Platform, PlatformError, ProcControl,
    ProcEvent, VerificationPacketConfig,
};
use tandem_verify::{PacketSink, ReferenceModel, ReplayModel, VerificationPacket, VerifyError};

/// Every collaborator call, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetClock { clock: u32, requested_hz: u64 },
    ProcControlCreated,
    PlatformCreated { ram: MemoryRegion, rom: MemoryRegion },
    PlatformInit,
    WriteMemory { addr: u64, len: usize },
    ConfigurePackets(VerificationPacketConfig),
    AttachSink,
    AttachMmio,
    ReferenceModel { htif_args: Vec<String>, ram_size: u64, isa: String },
    PerfCreated,
    Start(Launch),
    Poll,
    SetFromhost(u64),
    Stop,
    SetEnable(bool),
    PrintPerformance(PathBuf),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Position of the first call matching `pred`.
pub fn position(log: &CallLog, pred: impl Fn(&Call) -> bool) -> Option<usize> {
    log.lock().iter().position(pred)
}

pub fn count(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.lock().iter().filter(|c| pred(c)).count()
}

/// Scripted behaviour of the mock device.
#[derive(Clone)]
pub struct Script {
    pub grant: Option<ClockGrant>,
    pub packets: Vec<VerificationPacket>,
    pub events: Vec<ProcEvent>,
    pub reference: Option<Vec<VerificationPacket>>,
    pub perf_write_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            grant: None,
            packets: Vec::new(),
            events: vec![ProcEvent::Progress, ProcEvent::ToHost(1)],
            reference: Some(Vec::new()),
            perf_write_fails: false,
        }
    }
}

impl Script {
    pub fn exit_with(code: i32) -> Self {
        Self {
            events: vec![ProcEvent::Progress, ProcEvent::Halted(code)],
            ..Self::default()
        }
    }
}

pub struct MockBackend {
    pub log: CallLog,
    script: Script,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            log: CallLog::default(),
            script,
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().push(call);
    }
}

impl ClockControl for MockBackend {
    fn set_clock_frequency(&mut self, clock: u32, requested_hz: u64) -> ClockGrant {
        self.record(Call::SetClock { clock, requested_hz });
        self.script
            .grant
            .unwrap_or_else(|| ClockGrant::granted(requested_hz))
    }
}

impl Backend for MockBackend {
    type Proc = MockProc;
    type Platform = MockPlatform;
    type Perf = MockPerf;

    fn proc_control(&mut self) -> tandem_platform::Result<MockProc> {
        self.record(Call::ProcControlCreated);
        Ok(MockProc {
            log: Arc::clone(&self.log),
            packets: self.script.packets.clone(),
            events: self.script.events.iter().copied().collect(),
            sink: None,
        })
    }

    fn platform(&mut self, ram: MemoryRegion, rom: MemoryRegion) -> MockPlatform {
        self.record(Call::PlatformCreated { ram, rom });
        MockPlatform {
            log: Arc::clone(&self.log),
            inner: SimPlatform::new(ram, rom),
        }
    }

    fn perf_monitor(&mut self) -> MockPerf {
        self.record(Call::PerfCreated);
        MockPerf {
            log: Arc::clone(&self.log),
            enabled: true,
            fail_write: self.script.perf_write_fails,
        }
    }

    fn external_mmio(&mut self) -> Box<dyn ExternalMmio> {
        Box::new(NoMmio)
    }

    fn reference_model(
        &mut self,
        htif_args: &[String],
        ram_size: u64,
        isa: &str,
    ) -> tandem_verify::Result<Box<dyn ReferenceModel>> {
        self.record(Call::ReferenceModel {
            htif_args: htif_args.to_vec(),
            ram_size,
            isa: isa.to_string(),
        });
        match &self.script.reference {
            Some(packets) => Ok(Box::new(ReplayModel::new(packets.clone()))),
            None => Err(VerifyError::Spawn {
                program: PathBuf::from("spike"),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            }),
        }
    }
}

pub struct MockProc {
    log: CallLog,
    packets: Vec<VerificationPacket>,
    events: VecDeque<ProcEvent>,
    sink: Option<Arc<dyn PacketSink>>,
}

impl ProcControl for MockProc {
    fn configure_verification_packets(&mut self, config: VerificationPacketConfig) {
        self.log.lock().push(Call::ConfigurePackets(config));
    }

    fn attach_packet_sink(&mut self, sink: Arc<dyn PacketSink>) {
        self.log.lock().push(Call::AttachSink);
        self.sink = Some(sink);
    }

    fn attach_mmio(&mut self, _mmio: Box<dyn ExternalMmio>) {
        self.log.lock().push(Call::AttachMmio);
    }

    fn start(&mut self, launch: &Launch) -> tandem_platform::Result<()> {
        self.log.lock().push(Call::Start(launch.clone()));
        Ok(())
    }

    fn poll(&mut self) -> tandem_platform::Result<ProcEvent> {
        self.log.lock().push(Call::Poll);
        if let Some(sink) = &self.sink {
            for packet in self.packets.drain(..) {
                sink.accept(&packet);
            }
        }
        self.events.pop_front().ok_or(PlatformError::NotStarted)
    }

    fn set_fromhost(&mut self, value: u64) -> tandem_platform::Result<()> {
        self.log.lock().push(Call::SetFromhost(value));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().push(Call::Stop);
    }
}

pub struct MockPlatform {
    log: CallLog,
    inner: SimPlatform,
}

impl Platform for MockPlatform {
    fn init(&mut self) -> tandem_platform::Result<()> {
        self.log.lock().push(Call::PlatformInit);
        self.inner.init()
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    fn ram(&self) -> MemoryRegion {
        self.inner.ram()
    }

    fn rom(&self) -> MemoryRegion {
        self.inner.rom()
    }

    fn write_memory(&mut self, addr: u64, data: &[u8]) -> tandem_platform::Result<()> {
        self.log.lock().push(Call::WriteMemory {
            addr,
            len: data.len(),
        });
        self.inner.write_memory(addr, data)
    }

    fn read_memory(&self, addr: u64, buf: &mut [u8]) -> tandem_platform::Result<()> {
        self.inner.read_memory(addr, buf)
    }
}

pub struct MockPerf {
    log: CallLog,
    enabled: bool,
    fail_write: bool,
}

impl PerfMonitor for MockPerf {
    fn set_enable(&mut self, enable: bool) {
        self.log.lock().push(Call::SetEnable(enable));
        self.enabled = enable;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn report(&self) -> PerformanceReport {
        PerformanceReport::default()
    }

    fn print_performance(&self, path: &Path) -> io::Result<()> {
        self.log.lock().push(Call::PrintPerformance(path.to_path_buf()));
        if self.fail_write {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        Ok(())
    }
}

struct NoMmio;

impl ExternalMmio for NoMmio {
    fn request(&mut self, _req: MmioRequest) -> MmioResponse {
        MmioResponse {
            data: 0,
            mapped: false,
        }
    }
}

/// Writer whose contents stay readable after it is handed out.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        let raw = String::from_utf8_lossy(&self.0.lock()).into_owned();
        console::strip_ansi_codes(&raw).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write a small RISC-V workload with `tohost`/`fromhost` symbols.
pub fn write_workload(dir: &Path) -> PathBuf {
    let path = dir.join("foo.elf");
    ElfBuilder::new(0x8000_0000)
        .segment(0x8000_0000, &[0x13, 0, 0, 0, 0x73, 0, 0x10, 0])
        .segment_with_bss(0x8000_1000, &[0; 8], 0x40)
        .symbol("tohost", 0x8000_1000)
        .symbol("fromhost", 0x8000_1008)
        .write_to(&path)
        .unwrap();
    path
}

pub fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
