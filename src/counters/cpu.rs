use std::path::PathBuf;

use super::{CpuTimes, ProviderError};

/// Reads host CPU time buckets from a procfs `stat` file.
#[derive(Debug, Clone)]
pub struct ProcStatReader {
    path: PathBuf,
}

impl ProcStatReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Result<CpuTimes, ProviderError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ProviderError::ProcStat {
                path: self.path.clone(),
                source,
            })?;

        parse_proc_stat(&text).ok_or_else(|| ProviderError::MalformedProcStat {
            path: self.path.clone(),
        })
    }
}

/// Parse the aggregate `cpu` line.
/// Format: "cpu  user nice system idle iowait irq softirq steal ..."
pub fn parse_proc_stat(text: &str) -> Option<CpuTimes> {
    let line = text
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;

    // Kernels older than 2.6 stop after idle; irq is then simply absent.
    if fields.len() < 4 {
        return None;
    }

    Some(CpuTimes {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        irq: fields.get(5).copied().unwrap_or(0),
    })
}
