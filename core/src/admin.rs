//! Dominion admin commander: enables and disables commanders on a dominion.

use dominion_ledger::{DynamicFieldName, LedgerRead, U64};
use dominion_types::{
    Argument, Command, CommandAction, CommandHeader, MoveCall, MoveTarget, ObjectId, TypeTag,
};

use crate::commander::{BuildFut, Commander, DecodeFut};
use crate::error::{BuildError, ReadError};
use crate::wire;

const MODULE: &str = "dominion_admin_commander";

pub struct DominionAdminCommander {
    package: ObjectId,
    tag: TypeTag,
}

impl DominionAdminCommander {
    #[must_use]
    pub fn new(package: &ObjectId) -> Self {
        Self {
            package: package.clone(),
            tag: TypeTag::from_parts(package, MODULE, "DominionAdminCommander"),
        }
    }
}

impl Commander for DominionAdminCommander {
    fn name(&self) -> &'static str {
        "dominion_admin"
    }

    fn commander_type(&self) -> &TypeTag {
        &self.tag
    }

    fn decode<'a>(
        &'a self,
        ledger: &'a dyn LedgerRead,
        header: &'a CommandHeader,
    ) -> DecodeFut<'a> {
        Box::pin(async move {
            let payload = ledger
                .get_dynamic_field_object(&header.id, &DynamicFieldName::u8(1))
                .await
                .map_err(|e| ReadError::payload(&header.id, e))?;
            wire::expect_struct(&payload, MODULE, "DominionAdminCommand")?;
            let kind = wire::field::<U64>(&payload, "kind")?.0;
            if kind > 1 {
                return Err(ReadError::UnknownCommandKind {
                    tag: self.tag.clone(),
                    kind,
                });
            }

            let name = ledger
                .get_dynamic_field_object(&payload.object_id, &DynamicFieldName::u8(0))
                .await
                .map_err(|e| ReadError::payload(&header.id, e))?;
            let commander = TypeTag::from_type_name(&wire::string_value(&name)?);
            Ok(if kind == 0 {
                CommandAction::EnableCommander { commander }
            } else {
                CommandAction::DisableCommander { commander }
            })
        })
    }

    fn execute_calls<'a>(
        &'a self,
        _ledger: &'a dyn LedgerRead,
        command: &'a Command,
        executor: Argument,
    ) -> BuildFut<'a> {
        Box::pin(async move {
            match command.action {
                CommandAction::EnableCommander { .. } | CommandAction::DisableCommander { .. } => {
                    Ok(vec![MoveCall::new(
                        MoveTarget::new(&self.package, MODULE, "execute"),
                        Vec::new(),
                        vec![executor, Argument::Object(command.header.dominion_id.clone())],
                    )])
                }
                CommandAction::TransferCoin { .. } => Err(BuildError::ActionMismatch {
                    tag: self.tag.clone(),
                    kind: command.action.kind(),
                }),
            }
        })
    }
}
