//! Coin commander: transfers of a dominion's coins.

use dominion_ledger::{DynamicFieldName, LedgerRead, U64};
use dominion_types::{
    Address, Argument, Command, CommandAction, CommandHeader, MoveCall, MoveTarget, ObjectId,
    TypeTag,
};

use crate::commander::{BuildFut, Commander, DecodeFut};
use crate::error::{BuildError, ReadError};
use crate::wire;

const MODULE: &str = "coin_commander";
const KIND_TRANSFER: u64 = 0;

pub struct CoinCommander {
    package: ObjectId,
    tag: TypeTag,
}

impl CoinCommander {
    #[must_use]
    pub fn new(package: &ObjectId) -> Self {
        Self {
            package: package.clone(),
            tag: TypeTag::from_parts(package, MODULE, "CoinCommander"),
        }
    }

    fn call(&self, function: &str, coin_type: &TypeTag, arguments: Vec<Argument>) -> MoveCall {
        MoveCall::new(
            MoveTarget::new(&self.package, MODULE, function),
            vec![coin_type.clone()],
            arguments,
        )
    }
}

impl Commander for CoinCommander {
    fn name(&self) -> &'static str {
        "coin"
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
            let coin_type = wire::generic_type(&payload, MODULE, "CoinCommand")?;
            let kind = wire::field::<U64>(&payload, "kind")?.0;
            if kind != KIND_TRANSFER {
                return Err(ReadError::UnknownCommandKind {
                    tag: self.tag.clone(),
                    kind,
                });
            }

            let recipient = ledger
                .get_dynamic_field_object(&payload.object_id, &DynamicFieldName::u8(0))
                .await
                .map_err(|e| ReadError::payload(&header.id, e))?;
            let amount = ledger
                .get_dynamic_field_object(&payload.object_id, &DynamicFieldName::u8(1))
                .await
                .map_err(|e| ReadError::payload(&header.id, e))?;
            Ok(CommandAction::TransferCoin {
                coin_type,
                recipient: wire::field::<Address>(&recipient, "value")?,
                amount: wire::field::<U64>(&amount, "value")?.0,
            })
        })
    }

    fn execute_calls<'a>(
        &'a self,
        ledger: &'a dyn LedgerRead,
        command: &'a Command,
        executor: Argument,
    ) -> BuildFut<'a> {
        Box::pin(async move {
            let CommandAction::TransferCoin {
                coin_type, amount, ..
            } = &command.action
            else {
                return Err(BuildError::ActionMismatch {
                    tag: self.tag.clone(),
                    kind: command.action.kind(),
                });
            };
            let dominion = &command.header.dominion_id;
            let coins = ledger.get_coins(dominion, coin_type).await?;
            let Some((target, sources)) = coins.split_first() else {
                return Err(BuildError::NoCoins {
                    dominion: dominion.clone(),
                    coin_type: coin_type.clone(),
                });
            };

            let available = coins.iter().fold(0u64, |sum, c| sum.saturating_add(c.balance));
            if available < *amount {
                return Err(BuildError::InsufficientBalance {
                    dominion: dominion.clone(),
                    coin_type: coin_type.clone(),
                    available,
                    amount: *amount,
                });
            }

            let mut calls: Vec<MoveCall> = sources
                .iter()
                .map(|source| {
                    self.call(
                        "join_coins",
                        coin_type,
                        vec![
                            Argument::Object(dominion.clone()),
                            Argument::Receiving(target.object_ref.clone()),
                            Argument::Receiving(source.object_ref.clone()),
                        ],
                    )
                })
                .collect();
            calls.push(self.call(
                "execute_transfer",
                coin_type,
                vec![
                    executor,
                    Argument::Object(dominion.clone()),
                    Argument::Receiving(target.object_ref.clone()),
                ],
            ));
            Ok(calls)
        })
    }
}
