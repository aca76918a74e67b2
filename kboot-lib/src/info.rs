use std::fmt::Write;

use crate::{KBootTool, Property, Result};

impl KBootTool {
    /// Query all bootloader properties of the connected MCU.
    pub fn info(&mut self) -> Result<Vec<Property>> {
        self.session.scoped(|device| device.get_properties())
    }
}

/// Format properties as the `name = 0xVALUE (decoded)` table.
pub fn render_properties(properties: &[Property]) -> String {
    let rule = "-".repeat(40);
    let mut out = format!("{}\n Connected MCU KBoot Info\n{}\n", rule, rule);
    for property in properties {
        let _ = writeln!(
            out,
            " {:<20} = 0x{:08X} ({})",
            property.name, property.raw_value, property.decoded
        );
    }
    out.push_str(&rule);
    out
}
