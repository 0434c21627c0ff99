/// Log tags identify the subsystem a message comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cli,
    Ledger,
    Reader,
    Executor,
    Controller,
    /// Records forwarded from the `log` crate, tagged with their target
    Other(String),
}

impl LogTag {
    /// Key used by `--debug <tag>` and `[logging] debug_tags`
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Cli => "cli".to_string(),
            LogTag::Ledger => "ledger".to_string(),
            LogTag::Reader => "reader".to_string(),
            LogTag::Executor => "executor".to_string(),
            LogTag::Controller => "controller".to_string(),
            LogTag::Other(target) => target
                .split("::")
                .next()
                .unwrap_or(target)
                .to_lowercase(),
        }
    }

    /// Uppercase label used in console and file output
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Cli => "CLI".to_string(),
            LogTag::Ledger => "LEDGER".to_string(),
            LogTag::Reader => "READER".to_string(),
            LogTag::Executor => "EXECUTOR".to_string(),
            LogTag::Controller => "CONTROL".to_string(),
            LogTag::Other(_) => self.to_debug_key().to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_tag_uses_crate_root() {
        let tag = LogTag::Other("reqwest::connect".to_string());
        assert_eq!(tag.to_debug_key(), "reqwest");
        assert_eq!(tag.to_plain_string(), "REQWEST");
        assert_eq!(LogTag::Controller.to_debug_key(), "controller");
    }
}
