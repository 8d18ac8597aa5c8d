// オブジェクト差分サービス
//
// テーブルレベル（インデックス、トリガー、権限）と
// スキーマレベル（列挙型、シーケンス、関数）のオブジェクトを比較します。

use crate::core::definition::{Schema, Table, TypeDef};
use crate::core::error::EngineWarning;
use crate::core::operation::{EnumValuePosition, Operation, QualifiedName};
use std::collections::HashSet;
use tracing::warn;

/// オブジェクト差分の結果
#[derive(Debug, Clone, Default)]
pub struct ObjectChanges {
    /// 作成・変更（Stage1）
    pub creates: Vec<Operation>,
    /// 削除（テーブルレベルは Stage1、スキーマレベルは Stage3）
    pub drops: Vec<Operation>,
    pub warnings: Vec<EngineWarning>,
}

impl ObjectChanges {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.drops.is_empty()
    }
}

/// オブジェクト差分サービス
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectDiffer;

impl ObjectDiffer {
    pub fn new() -> Self {
        Self
    }

    /// インデックス、トリガー、権限の差分
    ///
    /// 同名で内容が変わったオブジェクトは削除して再作成します。
    ///
    /// # Arguments
    ///
    /// * `old` - 古いテーブル（新規テーブルの場合は `None`）
    /// * `new` - 新しいテーブル
    /// * `target` - 操作対象のテーブル名（新しい名前）
    pub fn diff_table_objects(
        &self,
        old: Option<&Table>,
        new: &Table,
        target: &QualifiedName,
    ) -> ObjectChanges {
        let mut changes = ObjectChanges::default();
        let empty = Table::default();
        let old = old.unwrap_or(&empty);

        for index in &old.indexes {
            let kept = new.indexes.iter().any(|i| i == index);
            if !kept {
                changes.drops.push(Operation::DropIndex {
                    table: target.clone(),
                    name: index.name.clone(),
                });
            }
        }
        for index in &new.indexes {
            if !old.indexes.contains(index) {
                changes.creates.push(Operation::CreateIndex {
                    table: target.clone(),
                    index: index.clone(),
                });
            }
        }

        for trigger in &old.triggers {
            if !new.triggers.contains(trigger) {
                changes.drops.push(Operation::DropTrigger {
                    table: target.clone(),
                    name: trigger.name.clone(),
                });
            }
        }
        for trigger in &new.triggers {
            if !old.triggers.contains(trigger) {
                changes.creates.push(Operation::CreateTrigger {
                    table: target.clone(),
                    trigger: trigger.clone(),
                });
            }
        }

        let old_grants: HashSet<_> = old.grants.iter().collect();
        let new_grants: HashSet<_> = new.grants.iter().collect();
        for grant in &old.grants {
            if !new_grants.contains(grant) {
                changes.drops.push(Operation::Revoke {
                    table: target.clone(),
                    grant: grant.clone(),
                });
            }
        }
        for grant in &new.grants {
            if !old_grants.contains(grant) {
                changes.creates.push(Operation::Grant {
                    table: target.clone(),
                    grant: grant.clone(),
                });
            }
        }

        changes
    }

    /// 列挙型、シーケンス、関数の差分
    ///
    /// 列挙型は値の追加のみを扱い、それ以外の変更は警告として記録します。
    pub fn diff_schema_objects(&self, old: Option<&Schema>, new: &Schema) -> ObjectChanges {
        let mut changes = ObjectChanges::default();
        let empty = Schema::default();
        let old = old.unwrap_or(&empty);
        let qualify = |name: &str| QualifiedName::new(&new.name, name);

        for type_def in &new.types {
            match old.get_type(&type_def.name) {
                None => changes.creates.push(Operation::CreateType {
                    name: qualify(&type_def.name),
                    values: type_def.values.clone(),
                }),
                Some(previous) if previous.values != type_def.values => {
                    self.extend_enum(&qualify(&type_def.name), previous, type_def, &mut changes)
                }
                Some(_) => {}
            }
        }
        let type_drops: Vec<Operation> = old
            .types
            .iter()
            .filter(|t| new.get_type(&t.name).is_none())
            .map(|t| Operation::DropType {
                name: qualify(&t.name),
            })
            .collect();

        for sequence in &new.sequences {
            match old.get_sequence(&sequence.name) {
                None => changes.creates.push(Operation::CreateSequence {
                    name: qualify(&sequence.name),
                    sequence: sequence.clone(),
                }),
                Some(previous) if previous != sequence => {
                    changes.creates.push(Operation::AlterSequence {
                        name: qualify(&sequence.name),
                        sequence: sequence.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        let sequence_drops: Vec<Operation> = old
            .sequences
            .iter()
            .filter(|s| new.get_sequence(&s.name).is_none())
            .map(|s| Operation::DropSequence {
                name: qualify(&s.name),
            })
            .collect();

        // 関数はオーバーロードがあるためシグネチャで照合する
        for function in &new.functions {
            let signature = function.signature();
            let previous = old.functions.iter().find(|f| f.signature() == signature);
            if previous != Some(function) {
                changes.creates.push(Operation::CreateFunction {
                    name: qualify(&function.name),
                    function: function.clone(),
                });
            }
        }
        for function in &old.functions {
            let signature = function.signature();
            if !new.functions.iter().any(|f| f.signature() == signature) {
                changes.drops.push(Operation::DropFunction {
                    name: qualify(&function.name),
                    signature,
                });
            }
        }
        // 削除順: 関数、シーケンス、型
        changes.drops.extend(sequence_drops);
        changes.drops.extend(type_drops);

        changes
    }

    fn extend_enum(
        &self,
        name: &QualifiedName,
        previous: &TypeDef,
        current: &TypeDef,
        changes: &mut ObjectChanges,
    ) {
        if !is_additive(&previous.values, &current.values) {
            warn!(type_name = %name, "Skipping non-additive enum change");
            changes.warnings.push(EngineWarning::unsupported_change(
                format!(
                    "enum type {} changed in a way other than adding values; change skipped",
                    name
                ),
                None,
            ));
            return;
        }

        for (position, value) in current.values.iter().enumerate() {
            if previous.values.contains(value) {
                continue;
            }
            let anchor = match position.checked_sub(1) {
                Some(before) => Some(EnumValuePosition::After(current.values[before].clone())),
                None => current
                    .values
                    .get(1)
                    .map(|next| EnumValuePosition::Before(next.clone())),
            };
            changes.creates.push(Operation::AddEnumValue {
                name: name.clone(),
                value: value.clone(),
                position: anchor,
            });
        }
    }
}

/// 旧い値が同じ相対順序のまま新しい値に含まれているか
fn is_additive(previous: &[String], current: &[String]) -> bool {
    let mut remaining = current.iter();
    previous
        .iter()
        .all(|value| remaining.any(|candidate| candidate == value))
}
