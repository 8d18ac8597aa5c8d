// Core Domain
// 定義ツリー、正規化された制約、操作、ステージ出力などの純粋なドメインモデル

pub mod config;
pub mod definition;
pub mod error;
pub mod naming;
pub mod object_ref;
pub mod operation;
pub mod stage;
pub mod table_constraint;
