/*
 * Responsibility
 * - tokio runtime 起動
 * - app::run() の呼び出し（ロジックは置かない）
 */
use tokengate::app;
use tokengate::error::AuthError;

#[tokio::main]
async fn main() -> Result<(), AuthError> {
    app::run().await
}
