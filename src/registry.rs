//! Name-keyed collection of scanners.

use crate::error::{error_chain, InstallError};
use crate::events::{ScannerEvent, SharedSink};
use crate::scanner::Scanner;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What [`ScannerRegistry::register`] does before inserting a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPolicy {
    /// Insert as-is; tools are installed on first use.
    #[default]
    Unconditional,
    /// Run `setup` first and refuse scanners whose tool cannot be installed.
    SetupFirst,
}

/// Concurrent map from scanner name to scanner.
///
/// Registering a name twice replaces the earlier scanner. Setup under
/// [`RegistrationPolicy::SetupFirst`] runs without holding the lock, so a
/// slow install does not block readers.
pub struct ScannerRegistry {
    scanners: RwLock<HashMap<String, Arc<dyn Scanner>>>,
    policy: RegistrationPolicy,
    events: SharedSink,
}

impl ScannerRegistry {
    pub fn new(events: SharedSink) -> Self {
        Self::with_policy(RegistrationPolicy::default(), events)
    }

    pub fn with_policy(policy: RegistrationPolicy, events: SharedSink) -> Self {
        Self {
            scanners: RwLock::new(HashMap::new()),
            policy,
            events,
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Scanner>>> {
        self.scanners.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Scanner>>> {
        self.scanners.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds `scanner` under its name.
    ///
    /// # Errors
    ///
    /// Under [`RegistrationPolicy::SetupFirst`], returns the setup error and
    /// leaves the registry unchanged.
    pub async fn register(&self, scanner: Arc<dyn Scanner>) -> Result<(), InstallError> {
        let name = scanner.name().to_string();

        if self.policy == RegistrationPolicy::SetupFirst {
            if let Err(err) = scanner.setup().await {
                self.events.emit(ScannerEvent::RegistrationFailed {
                    tool: name,
                    error: error_chain(&err),
                });
                return Err(err);
            }
        }

        self.write().insert(name.clone(), scanner);
        self.events.emit(ScannerEvent::Registered { tool: name });
        Ok(())
    }

    /// Registers each scanner in turn and returns the refused ones with
    /// their errors.
    ///
    /// Setups run one at a time: apt holds a system-wide lock and sudo
    /// prompts share the terminal.
    pub async fn register_all(
        &self,
        scanners: impl IntoIterator<Item = Arc<dyn Scanner>>,
    ) -> Vec<(String, InstallError)> {
        let mut refused = Vec::new();
        for scanner in scanners {
            let name = scanner.name().to_string();
            if let Err(err) = self.register(scanner).await {
                refused.push((name, err));
            }
        }
        refused
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Point-in-time copy of the registry contents.
    pub fn get_all(&self) -> HashMap<String, Arc<dyn Scanner>> {
        self.read().clone()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanFailure;
    use crate::events::RecordingSink;
    use crate::model::{InstallationState, ScannerConfig, ScannerResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeScanner {
        config: ScannerConfig,
        fail_setup: bool,
        setups: AtomicUsize,
        marker: &'static str,
    }

    impl FakeScanner {
        fn new(name: &str, marker: &'static str) -> Arc<Self> {
            Arc::new(Self {
                config: ScannerConfig::new(name),
                fail_setup: false,
                setups: AtomicUsize::new(0),
                marker,
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                config: ScannerConfig::new(name),
                fail_setup: true,
                setups: AtomicUsize::new(0),
                marker: "",
            })
        }
    }

    #[async_trait]
    impl Scanner for FakeScanner {
        fn config(&self) -> &ScannerConfig {
            &self.config
        }

        async fn setup(&self) -> Result<(), InstallError> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                return Err(InstallError::setup(
                    &self.config.name,
                    InstallError::NotVerified {
                        tool: self.config.name.clone(),
                    },
                ));
            }
            Ok(())
        }

        async fn is_installed(&self) -> bool {
            !self.fail_setup
        }

        async fn installation_state(&self) -> InstallationState {
            InstallationState::default()
        }

        async fn scan(&self, _target: &str) -> Result<ScannerResult, ScanFailure> {
            let mut result = ScannerResult::new();
            result.push_data(self.marker);
            Ok(result)
        }
    }

    #[tokio::test]
    async fn test_register_distinct_names() {
        let registry = ScannerRegistry::new(RecordingSink::new());
        registry.register(FakeScanner::new("nmap", "a")).await.unwrap();
        registry.register(FakeScanner::new("whois", "b")).await.unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list(), vec!["nmap", "whois"]);
        assert!(registry.get("nmap").is_some());
        assert!(registry.get("nuclei").is_none());
    }

    #[tokio::test]
    async fn test_register_same_name_replaces() {
        let registry = ScannerRegistry::new(RecordingSink::new());
        registry.register(FakeScanner::new("nmap", "first")).await.unwrap();
        registry.register(FakeScanner::new("nmap", "second")).await.unwrap();

        assert_eq!(registry.len(), 1);
        let result = registry.get("nmap").unwrap().scan("x").await.unwrap();
        assert_eq!(result.data, vec!["second"]);
    }

    #[tokio::test]
    async fn test_unconditional_skips_setup() {
        let registry = ScannerRegistry::new(RecordingSink::new());
        let scanner = FakeScanner::failing("masscan");
        registry.register(scanner.clone()).await.unwrap();

        assert_eq!(scanner.setups.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_setup_first_failure_aborts_registration() {
        let sink = RecordingSink::new();
        let registry = ScannerRegistry::with_policy(RegistrationPolicy::SetupFirst, sink.clone());

        let err = registry.register(FakeScanner::failing("masscan")).await.unwrap_err();

        assert!(matches!(err, InstallError::Setup { .. }));
        assert!(registry.is_empty());
        assert_eq!(
            sink.count(|e| matches!(e, ScannerEvent::RegistrationFailed { .. })),
            1
        );
        assert_eq!(sink.count(|e| matches!(e, ScannerEvent::Registered { .. })), 0);
    }

    #[tokio::test]
    async fn test_setup_first_success_registers() {
        let registry =
            ScannerRegistry::with_policy(RegistrationPolicy::SetupFirst, RecordingSink::new());
        let scanner = FakeScanner::new("nmap", "a");
        registry.register(scanner.clone()).await.unwrap();

        assert_eq!(scanner.setups.load(Ordering::SeqCst), 1);
        assert_eq!(registry.list(), vec!["nmap"]);
    }

    #[tokio::test]
    async fn test_get_all_is_a_snapshot() {
        let registry = ScannerRegistry::new(RecordingSink::new());
        registry.register(FakeScanner::new("nmap", "a")).await.unwrap();

        let snapshot = registry.get_all();
        registry.remove("nmap");

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(ScannerRegistry::new(RecordingSink::new()));
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let registry = registry.clone();
                let scanner = FakeScanner::new(name, "x");
                tokio::spawn(async move { registry.register(scanner).await })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.unwrap().unwrap();
        }

        assert_eq!(registry.len(), names.len());
    }

    struct SlowScanner {
        config: ScannerConfig,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scanner for SlowScanner {
        fn config(&self) -> &ScannerConfig {
            &self.config
        }

        async fn setup(&self) -> Result<(), InstallError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn is_installed(&self) -> bool {
            true
        }

        async fn installation_state(&self) -> InstallationState {
            InstallationState::default()
        }

        async fn scan(&self, _target: &str) -> Result<ScannerResult, ScanFailure> {
            Ok(ScannerResult::new())
        }
    }

    #[tokio::test]
    async fn test_register_all_runs_setups_one_at_a_time() {
        let sink = RecordingSink::new();
        let registry = ScannerRegistry::with_policy(RegistrationPolicy::SetupFirst, sink.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut scanners: Vec<Arc<dyn Scanner>> = ["nmap", "whois", "masscan", "wpscan"]
            .iter()
            .map(|name| {
                Arc::new(SlowScanner {
                    config: ScannerConfig::new(*name),
                    active: active.clone(),
                    peak: peak.clone(),
                }) as Arc<dyn Scanner>
            })
            .collect();
        scanners.push(FakeScanner::failing("sqlmap"));

        let refused = registry.register_all(scanners).await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(refused.len(), 1);
        assert_eq!(refused[0].0, "sqlmap");
        assert_eq!(registry.list(), vec!["masscan", "nmap", "whois", "wpscan"]);
        assert_eq!(
            sink.count(|e| matches!(e, ScannerEvent::RegistrationFailed { .. })),
            1
        );
    }
}
