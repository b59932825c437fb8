//! Commands: single privileged actions carried by a proposal option.

use crate::ids::{Address, ObjectId, TypeTag};

/// Fields every command carries regardless of its commander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHeader {
    pub id: ObjectId,
    /// Type tag of the commander the command was created under.
    pub commander: TypeTag,
    pub dominion_id: ObjectId,
    pub execution_error: Option<String>,
    pub is_executed: bool,
}

/// Variant-specific payload, decoded by the command's commander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    TransferCoin {
        coin_type: TypeTag,
        recipient: Address,
        amount: u64,
    },
    EnableCommander {
        commander: TypeTag,
    },
    DisableCommander {
        commander: TypeTag,
    },
}

impl CommandAction {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CommandAction::TransferCoin { .. } => "transferCoin",
            CommandAction::EnableCommander { .. } => "enableCommander",
            CommandAction::DisableCommander { .. } => "disableCommander",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub header: CommandHeader,
    pub action: CommandAction,
}

impl Command {
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.header.id
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.header.execution_error.is_some()
    }
}
