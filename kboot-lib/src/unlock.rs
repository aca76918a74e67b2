use crate::backdoor_key::BackdoorKey;
use crate::progress::ProgressOperation;
use crate::{KBootTool, Result, Status, run_command};

#[derive(Debug, Clone, Default)]
pub struct UnlockParams {
    /// `S:<16 characters>` or `X:<32 hex digits>`; mass erase when absent.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockMethod {
    MassErase,
    BackdoorKey(BackdoorKey),
}

impl UnlockParams {
    pub fn method(&self) -> Result<UnlockMethod> {
        match &self.key {
            Some(key) => Ok(UnlockMethod::BackdoorKey(key.parse()?)),
            None => Ok(UnlockMethod::MassErase),
        }
    }
}

impl KBootTool {
    pub fn unlock(&mut self, params: &UnlockParams) -> Result<Status> {
        let method = params.method()?;

        let progress = self.progress.clone();
        self.session.scoped(|device| match method {
            UnlockMethod::MassErase => run_command(
                &progress,
                ProgressOperation::EraseAllUnsecure,
                "flash erase all unsecure",
                || device.flash_erase_all_unsecure(),
            ),
            UnlockMethod::BackdoorKey(key) => run_command(
                &progress,
                ProgressOperation::Unlock,
                "flash security disable",
                || device.flash_security_disable(&key),
            ),
        })
    }
}
