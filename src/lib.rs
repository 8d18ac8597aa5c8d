// stagediffライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメイン（定義ツリー、制約、操作、ステージ出力）
// - services: 依存解決、差分検出、ステージ出力の組み立て
// - adapters: 方言別SQLレンダリングとファイル出力を抽象化

pub mod adapters;
pub mod cli;
pub mod core;
pub mod services;
