use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match labinsight_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("labinsight: {e}");
            ExitCode::FAILURE
        }
    }
}
