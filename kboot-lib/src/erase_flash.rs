use crate::progress::ProgressOperation;
use crate::utils::Utils;
use crate::{Error, KBootTool, Result, Status, run_command};

#[derive(Debug, Clone, Default)]
pub struct EraseFlashParams {
    pub address: String,
    /// Region length; the whole flash is erased when absent.
    pub length: Option<String>,
    /// Erase the whole flash even when a length is given.
    pub mass: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseScope {
    All,
    Region { address: u32, len: u32 },
}

impl EraseFlashParams {
    /// Validate the arguments and work out what will be erased.
    pub fn scope(&self) -> Result<EraseScope> {
        let address = Utils::parse_u32("address", &self.address)?;
        let length = self
            .length
            .as_deref()
            .map(|length| Utils::parse_u32("length", length))
            .transpose()?;

        if self.mass {
            return Ok(EraseScope::All);
        }
        match length {
            None => Ok(EraseScope::All),
            Some(0) => Err(Error::invalid_argument("length must be greater than zero")),
            Some(len) => Ok(EraseScope::Region { address, len }),
        }
    }
}

impl KBootTool {
    pub fn erase_flash(&mut self, params: &EraseFlashParams) -> Result<Status> {
        let scope = params.scope()?;

        let progress = self.progress.clone();
        self.session.scoped(|device| match scope {
            EraseScope::All => run_command(
                &progress,
                ProgressOperation::EraseAll,
                "flash erase all",
                || device.flash_erase_all(),
            ),
            EraseScope::Region { address, len } => run_command(
                &progress,
                ProgressOperation::EraseRegion { address, len },
                "flash erase region",
                || device.flash_erase_region(address, len),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(address: &str, length: Option<&str>, mass: bool) -> EraseFlashParams {
        EraseFlashParams {
            address: address.to_string(),
            length: length.map(str::to_string),
            mass,
        }
    }

    #[test]
    fn region_needs_length_and_no_mass_flag() {
        assert_eq!(
            params("0x1000", Some("0x400"), false).scope().unwrap(),
            EraseScope::Region {
                address: 0x1000,
                len: 0x400
            }
        );
        assert_eq!(params("0x1000", None, false).scope().unwrap(), EraseScope::All);
        assert_eq!(
            params("0x1000", Some("0x400"), true).scope().unwrap(),
            EraseScope::All
        );
    }

    #[test]
    fn mass_flag_ignores_zero_length() {
        assert_eq!(params("0", Some("0"), true).scope().unwrap(), EraseScope::All);
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        for p in [
            params("zero", None, false),
            params("0", Some("lots"), false),
            params("0", Some("0"), false),
            params("0", Some(""), true),
        ] {
            assert!(matches!(p.scope(), Err(Error::ArgumentInvalid(_))), "{p:?}");
        }
    }
}
