use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match damaris_spa::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error al iniciar Damaris Spa: {e}");
            ExitCode::FAILURE
        }
    }
}
