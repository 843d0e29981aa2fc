/// ライブラリが返すエラー
///
/// `Parse`・`UnknownKind`・`MissingElement` は表示エンジンの外には出ない。
/// エンジンがログに残して該当ターゲットを飛ばす。ホストが同じ語彙を使えるよう公開している。
#[derive(thiserror::Error, Debug)]
pub enum SensoryError {
    #[error("Parse error: no number in {0:?}")]
    Parse(String),

    #[error("Unknown reveal kind: {0:?}")]
    UnknownKind(String),

    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid scene: {0}")]
    Scene(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SensoryError>;
