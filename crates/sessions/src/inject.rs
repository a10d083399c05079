//! Mock injection: write a line to a log as if a device had sent it.

use sl_domain::error::Result;
use sl_domain::trace::TraceEvent;
use sl_logstore::LogName;

use crate::registry::SessionRegistry;

impl SessionRegistry {
    /// Append `text` to `log_name` without touching any device.  Entries
    /// are formatted exactly like device lines.
    pub async fn inject(&self, log_name: &str, text: &str) -> Result<LogName> {
        let name = self.store().normalize(log_name)?;
        self.store().append_async(name.as_str(), text).await?;

        TraceEvent::MockInjected {
            log_name: name.to_string(),
            chars: text.chars().count(),
        }
        .emit();
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sl_domain::error::Error;
    use sl_logstore::LogStore;
    use sl_serial::MockSerialProvider;

    use crate::registry::{RegistrySettings, SessionRegistry};

    fn registry(dir: &tempfile::TempDir) -> Arc<SessionRegistry> {
        SessionRegistry::new(
            Arc::new(LogStore::new(dir.path(), "txt").unwrap()),
            Arc::new(MockSerialProvider::new(["COM1"])),
            RegistrySettings {
                default_baud_rate: 9600,
                default_log_name: sl_logstore::LogName::parse("default", "txt").unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn open_inject_close_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let store = registry.store().clone();

        registry.open("COM1", 9600, "sessionA").await.unwrap();
        registry.inject("sessionA", "hello").await.unwrap();
        let a = store.read_all("sessionA").unwrap();
        assert!(a.lines().any(|l| l.ends_with("hello")));

        registry.close("COM1").await.unwrap();
        assert!(!registry.snapshot().active_ports().contains(&"COM1".to_string()));

        registry.open("COM1", 9600, "sessionB").await.unwrap();
        registry.inject("sessionB", "world").await.unwrap();

        assert_eq!(store.read_all("sessionA").unwrap(), a);
        assert!(store.read_all("sessionB").unwrap().contains("world"));
    }

    #[tokio::test]
    async fn inject_needs_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let name = registry.inject("loose", "line").await.unwrap();
        assert_eq!(name.as_str(), "loose.txt");
        let content = registry.store().read_all("loose.txt").unwrap();
        assert!(content.starts_with('[') && content.ends_with("] line\n"));
    }

    #[tokio::test]
    async fn inject_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        assert!(matches!(
            registry.inject("../x", "nope").await,
            Err(Error::InvalidName(_))
        ));
    }
}
