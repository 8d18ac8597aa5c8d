// Services Layer
// ドメインロジックを実行するサービス層

pub mod constraint_reconciler;
pub mod data_row_differ;
pub mod definition_checksum;
pub mod definition_loader;
pub mod definition_validator;
pub mod dependency_resolver;
pub mod diff_orchestrator;
pub mod object_differ;
pub mod reference_resolver;
pub mod rename_registry;
pub mod table_differ;
