use crate::config::PlatformConfig;
use crate::traits::FirmwareUpdater;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct UpdateState {
    file: Option<File>,
    written: u64,
    error: Option<String>,
}

/// Writes the uploaded image to a staging file and moves it over the
/// installed binary once complete. Restarting runs a configurable command.
#[derive(Debug)]
pub struct FileUpdater {
    staging_path: PathBuf,
    target_path: PathBuf,
    reboot_command: Vec<String>,
    state: Mutex<UpdateState>,
}

impl FileUpdater {
    pub fn new(
        staging_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        reboot_command: Vec<String>,
    ) -> Self {
        Self {
            staging_path: staging_path.into(),
            target_path: target_path.into(),
            reboot_command,
            state: Mutex::new(UpdateState::default()),
        }
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(
            &config.staging_path,
            &config.firmware_path,
            config.reboot_command.clone(),
        )
    }

    fn fail(state: &mut UpdateState, msg: String) -> Error {
        tracing::error!("{}", msg);
        state.error = Some(msg.clone());
        state.file = None;
        Error::Update(msg)
    }
}

#[async_trait]
impl FirmwareUpdater for FileUpdater {
    async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = UpdateState::default();
        match File::create(&self.staging_path).await {
            Ok(file) => {
                tracing::debug!(path = ?self.staging_path, "Staging firmware image");
                state.file = Some(file);
                Ok(())
            }
            Err(e) => Err(Self::fail(
                &mut state,
                format!("cannot create {:?}: {}", self.staging_path, e),
            )),
        }
    }

    async fn write(&self, chunk: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let result = match state.file.as_mut() {
            Some(file) => file
                .write_all(chunk)
                .await
                .map_err(|e| format!("staging write failed: {}", e)),
            None => Err("write without begin".to_string()),
        };
        match result {
            Ok(()) => {
                state.written += chunk.len() as u64;
                Ok(chunk.len())
            }
            Err(msg) => Err(Self::fail(&mut state, msg)),
        }
    }

    async fn end(&self, set_size: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(mut file) = state.file.take() else {
            return Err(Self::fail(&mut state, "end without begin".to_string()));
        };
        if state.written == 0 {
            return Err(Self::fail(&mut state, "empty image".to_string()));
        }
        if let Err(e) = file.flush().await {
            return Err(Self::fail(&mut state, format!("flush failed: {}", e)));
        }
        if set_size {
            if let Err(e) = file.set_len(state.written).await {
                return Err(Self::fail(&mut state, format!("truncate failed: {}", e)));
            }
        }
        if let Err(e) = file.sync_all().await {
            return Err(Self::fail(&mut state, format!("sync failed: {}", e)));
        }
        drop(file);

        if let Err(e) = tokio::fs::rename(&self.staging_path, &self.target_path).await {
            return Err(Self::fail(
                &mut state,
                format!("cannot install {:?}: {}", self.target_path, e),
            ));
        }
        tracing::info!(bytes = state.written, path = ?self.target_path, "Firmware image installed");
        Ok(())
    }

    async fn has_error(&self) -> bool {
        self.state.lock().await.error.is_some()
    }

    async fn restart(&self) -> Result<()> {
        let Some((program, args)) = self.reboot_command.split_first() else {
            return Err(Error::CommandFailed("reboot command is empty".to_string()));
        };
        let status = Command::new(program).args(args).status().await?;
        if !status.success() {
            return Err(Error::CommandFailed(format!(
                "{} exited with {}",
                self.reboot_command.join(" "),
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wifi-manager-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn installs_image_on_end() {
        let dir = scratch_dir("install");
        let updater = FileUpdater::new(dir.join("staging.bin"), dir.join("firmware.bin"), vec![]);

        updater.begin().await.unwrap();
        assert_eq!(updater.write(b"abc").await.unwrap(), 3);
        assert_eq!(updater.write(b"def").await.unwrap(), 3);
        updater.end(true).await.unwrap();

        assert!(!updater.has_error().await);
        assert_eq!(std::fs::read(dir.join("firmware.bin")).unwrap(), b"abcdef");
        assert!(!dir.join("staging.bin").exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let dir = scratch_dir("empty");
        let updater = FileUpdater::new(dir.join("staging.bin"), dir.join("firmware.bin"), vec![]);

        updater.begin().await.unwrap();
        assert!(updater.end(true).await.is_err());
        assert!(updater.has_error().await);
        assert!(!dir.join("firmware.bin").exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn write_without_begin_sets_error() {
        let dir = scratch_dir("nobegin");
        let updater = FileUpdater::new(dir.join("staging.bin"), dir.join("firmware.bin"), vec![]);

        assert!(updater.write(b"abc").await.is_err());
        assert!(updater.has_error().await);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn empty_reboot_command_fails() {
        let updater = FileUpdater::new("/nonexistent/a", "/nonexistent/b", vec![]);
        assert!(matches!(updater.restart().await, Err(Error::CommandFailed(_))));
    }
}
