use std::error::Error;

use processing::executable_utils::{initialize_executable, run_processor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = initialize_executable()?;
    run_processor(config).await
}
