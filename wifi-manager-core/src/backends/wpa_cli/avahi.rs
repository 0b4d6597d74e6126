use crate::traits::MdnsResponder;
use crate::Result;
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Publishes the HTTP service through the Avahi daemon.
#[derive(Debug, Default)]
pub struct AvahiResponder {
    publisher: Mutex<Option<Child>>,
}

impl AvahiResponder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MdnsResponder for AvahiResponder {
    async fn announce(&self, hostname: &str, port: u16) -> Result<()> {
        let mut publisher = self.publisher.lock().await;
        if let Some(mut child) = publisher.take() {
            let _ = child.kill().await;
        }

        // avahi-publish 在前台运行，进程存活期间服务保持发布
        let child = Command::new("avahi-publish")
            .arg("-s")
            .arg(hostname)
            .arg("_http._tcp")
            .arg(port.to_string())
            .kill_on_drop(true)
            .spawn()?;
        *publisher = Some(child);

        tracing::info!("mDNS: publishing {} (_http._tcp, port {})", hostname, port);
        Ok(())
    }
}
