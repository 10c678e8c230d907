use std::str::FromStr;

/// Which trace reader feeds the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderVariant {
    #[default]
    Default,
    /// Folds the spurious second dispatch emitted with ata_piix controllers.
    AtaPiix,
}

impl FromStr for ReaderVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "default" => Ok(ReaderVariant::Default),
            "1" | "ata_piix" | "ata-piix" => Ok(ReaderVariant::AtaPiix),
            _ => Err(format!("Unknown trace reader: {s} (expected 0 or 1)")),
        }
    }
}

impl ReaderVariant {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReaderVariant::Default => "default",
            ReaderVariant::AtaPiix => "ata_piix",
        }
    }
}
