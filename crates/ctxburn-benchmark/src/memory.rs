use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB_PER_GIB: f64 = 1024.0;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to execute {tool}: {source}")]
    ExecutionFailed {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Unrecognized {tool} output: {output}")]
    Parse { tool: &'static str, output: String },
}

/// Device memory telemetry around a single request.
///
/// `reset_peak` must be called strictly before the engine call and `peak_gb`
/// strictly after it; the window belongs to exactly one request.
pub trait MemoryProbe {
    fn reset_peak(&mut self);
    /// Peak device memory in GiB observed since the last reset.
    fn peak_gb(&mut self) -> f64;
}

/// No accelerator present: always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeviceProbe;

impl MemoryProbe for NoDeviceProbe {
    fn reset_peak(&mut self) {}

    fn peak_gb(&mut self) -> f64 {
        0.0
    }
}

/// Vendor SMI tool used to read device memory in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmiTool {
    Rocm,
    Nvidia,
}

impl SmiTool {
    fn program(self) -> &'static str {
        match self {
            SmiTool::Rocm => "rocm-smi",
            SmiTool::Nvidia => "nvidia-smi",
        }
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            SmiTool::Rocm => {
                cmd.args(["--showmeminfo", "vram", "--csv"]);
            }
            SmiTool::Nvidia => {
                cmd.args([
                    "--query-gpu=memory.used",
                    "--format=csv,noheader,nounits",
                ]);
            }
        }
        cmd
    }

    /// Device memory in use, summed across devices, in GiB.
    pub fn read_used_gb(self) -> Result<f64, ProbeError> {
        let out = self.command().output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return ProbeError::NotFound(self.program());
            }
            ProbeError::ExecutionFailed {
                tool: self.program(),
                source: e,
            }
        })?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        let parsed = match self {
            SmiTool::Rocm => parse_rocm_used_bytes(&stdout).map(|b| b / BYTES_PER_GIB),
            SmiTool::Nvidia => parse_nvidia_used_mib(&stdout).map(|m| m / MIB_PER_GIB),
        };

        parsed.ok_or_else(|| ProbeError::Parse {
            tool: self.program(),
            output: stdout.chars().take(200).collect(),
        })
    }
}

/// Sums the "used" column of `rocm-smi --showmeminfo vram --csv`.
pub fn parse_rocm_used_bytes(output: &str) -> Option<f64> {
    let mut lines = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.contains(','));

    let header = lines.next()?;
    let used_col = header
        .split(',')
        .position(|h| h.to_ascii_lowercase().contains("used"))?;

    let mut total = 0.0;
    let mut rows = 0;
    for line in lines {
        let value = line.split(',').nth(used_col)?.trim().parse::<f64>().ok()?;
        total += value;
        rows += 1;
    }

    (rows > 0).then_some(total)
}

/// Sums one MiB value per line from `nvidia-smi --query-gpu=memory.used`.
pub fn parse_nvidia_used_mib(output: &str) -> Option<f64> {
    let values: Option<Vec<f64>> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<f64>().ok())
        .collect();

    let values = values?;
    (!values.is_empty()).then(|| values.iter().sum())
}

struct Sampler {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<f64>,
}

/// Polls an SMI tool on a background thread for the duration of one request
/// and keeps the highest reading.
pub struct SmiMemoryProbe {
    tool: SmiTool,
    poll_interval: Duration,
    sampler: Option<Sampler>,
}

impl SmiMemoryProbe {
    pub fn new(tool: SmiTool, poll_interval: Duration) -> Self {
        Self {
            tool,
            poll_interval,
            sampler: None,
        }
    }

    fn stop_sampler(&mut self) -> f64 {
        let Some(sampler) = self.sampler.take() else {
            return 0.0;
        };
        sampler.stop.store(true, Ordering::SeqCst);
        match sampler.handle.join() {
            Ok(peak) => peak,
            Err(_) => {
                warn!("Memory sampler thread panicked");
                0.0
            }
        }
    }
}

impl MemoryProbe for SmiMemoryProbe {
    #[instrument(skip(self), fields(tool = self.tool.program()))]
    fn reset_peak(&mut self) {
        self.stop_sampler();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let tool = self.tool;
        let interval = self.poll_interval;

        // First reading is taken before this returns so the window always
        // contains at least one sample from before the engine call.
        let first = read_or_warn(tool);

        let handle = thread::spawn(move || {
            let mut peak = first;
            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(interval);
                peak = peak.max(read_or_warn(tool));
            }
            // Final reading after the request ended.
            peak.max(read_or_warn(tool))
        });

        self.sampler = Some(Sampler { stop, handle });
    }

    fn peak_gb(&mut self) -> f64 {
        let peak = self.stop_sampler();
        debug!(peak_gb = peak, "Device memory window closed");
        peak
    }
}

impl Drop for SmiMemoryProbe {
    fn drop(&mut self) {
        self.stop_sampler();
    }
}

fn read_or_warn(tool: SmiTool) -> f64 {
    match tool.read_used_gb() {
        Ok(gb) => gb,
        Err(e) => {
            warn!("Device memory read failed: {}", e);
            0.0
        }
    }
}

/// Pick the first SMI tool that answers, or fall back to [`NoDeviceProbe`].
pub fn detect_memory_probe(poll_interval: Duration) -> Box<dyn MemoryProbe> {
    for tool in [SmiTool::Rocm, SmiTool::Nvidia] {
        match tool.read_used_gb() {
            Ok(gb) => {
                info!(tool = tool.program(), used_gb = gb, "Device memory telemetry enabled");
                return Box::new(SmiMemoryProbe::new(tool, poll_interval));
            }
            Err(e) => debug!("{} unavailable: {}", tool.program(), e),
        }
    }
    info!("No accelerator telemetry found, recording 0 GB peak memory");
    Box::new(NoDeviceProbe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rocm_csv() {
        let output = "device,VRAM Total Memory (B),VRAM Total Used Memory (B)\n\
                      card0,17163091968,2147483648\n\
                      card1,17163091968,1073741824\n";
        let used = parse_rocm_used_bytes(output).unwrap();
        assert_eq!(used, 3221225472.0);
        assert_eq!(used / BYTES_PER_GIB, 3.0);
    }

    #[test]
    fn test_parse_rocm_banner_lines_ignored() {
        let output = "\n\n===== ROCm System Management Interface =====\n\
                      device,VRAM Total Memory (B),VRAM Total Used Memory (B)\n\
                      card0,100,50\n";
        assert_eq!(parse_rocm_used_bytes(output), Some(50.0));
    }

    #[test]
    fn test_parse_rocm_garbage() {
        assert_eq!(parse_rocm_used_bytes("not csv at all"), None);
        assert_eq!(parse_rocm_used_bytes("device,total,used\ncard0,1,x\n"), None);
    }

    #[test]
    fn test_parse_nvidia() {
        assert_eq!(parse_nvidia_used_mib("1024\n2048\n"), Some(3072.0));
        assert_eq!(parse_nvidia_used_mib(""), None);
        assert_eq!(parse_nvidia_used_mib("N/A\n"), None);
    }

    #[test]
    fn test_no_device_probe_reports_zero() {
        let mut probe = NoDeviceProbe;
        probe.reset_peak();
        assert_eq!(probe.peak_gb(), 0.0);
    }

    #[test]
    fn test_peak_without_reset_is_zero() {
        let mut probe = SmiMemoryProbe::new(SmiTool::Nvidia, Duration::from_millis(10));
        assert_eq!(probe.peak_gb(), 0.0);
    }
}
