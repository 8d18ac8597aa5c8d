// Adapters
// ステートメントのレンダリングとファイル出力を抽象化

pub mod output_writer;
pub mod sql_renderer;
