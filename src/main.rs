// NusTerm - BLE Nordic UART Service shell
use clap::Parser;
use nusterm::cli::{execute_command, Args, ConsoleWriter, OutputWriter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let writer = ConsoleWriter::new(args.output.clone());

    match execute_command(args).await {
        Ok(()) => {}
        Err(e) if e.is_user_abort() => {
            if writer.write_message(&e.to_string()).is_err() {
                println!("{}", e);
            }
        }
        Err(e) => {
            if writer.write_error(&e.to_string()).is_err() {
                eprintln!("Error: {}", e);
            }
            std::process::exit(1);
        }
    }
}
