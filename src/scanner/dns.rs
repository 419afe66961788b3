use super::Scanner;
use crate::error::{InstallError, ScanError, ScanFailure};
use crate::events::{ScannerEvent, SharedSink};
use crate::model::{InstallationState, ScannerConfig, ScannerResult};
use crate::target::extract_domain;
use async_trait::async_trait;
use std::io;
use std::net::IpAddr;

/// In-process resolver for a target's A/AAAA records.
///
/// Nothing to install; `setup` and `is_installed` are constant.
pub struct DnsScanner {
    config: ScannerConfig,
    events: SharedSink,
}

impl DnsScanner {
    pub const NAME: &'static str = "dns";

    pub fn new(events: SharedSink) -> Self {
        Self {
            config: ScannerConfig::embedded(Self::NAME),
            events,
        }
    }
}

#[async_trait]
impl Scanner for DnsScanner {
    fn config(&self) -> &ScannerConfig {
        &self.config
    }

    async fn setup(&self) -> Result<(), InstallError> {
        Ok(())
    }

    async fn is_installed(&self) -> bool {
        true
    }

    async fn installation_state(&self) -> InstallationState {
        InstallationState::embedded(self.config.version.as_str())
    }

    async fn scan(&self, target: &str) -> Result<ScannerResult, ScanFailure> {
        let host = extract_domain(target);
        self.events.emit(ScannerEvent::ScanStarted {
            tool: self.config.name.clone(),
            target: target.to_string(),
        });

        let mut result = ScannerResult::new();
        match resolve(&host).await {
            Ok(addrs) => {
                for addr in addrs {
                    result.push_data(addr.to_string());
                }
            }
            Err(source) => {
                result.push_error(format!("failed to resolve {}: {}", host, source));
                return Err(ScanFailure::new(
                    result,
                    ScanError::Resolve {
                        target: host,
                        source,
                    },
                ));
            }
        }

        self.events.emit(ScannerEvent::ScanFinished {
            tool: self.config.name.clone(),
            data: result.data.len(),
            errors: result.errors.len(),
        });
        Ok(result)
    }
}

/// Unique addresses of `host` in resolver order.
async fn resolve(host: &str) -> io::Result<Vec<IpAddr>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty host"));
    }

    let mut addrs: Vec<IpAddr> = Vec::new();
    for addr in tokio::net::lookup_host((host, 0)).await? {
        if !addrs.contains(&addr.ip()) {
            addrs.push(addr.ip());
        }
    }
    Ok(addrs)
}
