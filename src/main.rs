//! Binary entry point for the volia CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use volia::{
    ApiError, BlockStorageClient, ComputeClient, CreateVolumeRequest, FormatError, FormatRequest,
    HelperError, OpenStackConfig, RemoteLogin, RemoteShell, SshConfig, SshError, VolumeHelper,
    connect,
};

mod cli;
use cli::{
    AttachCommand, Cli, CreateCommand, DeleteCommand, DetachCommand, FormatCommand, LookupCommand,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Connect(#[source] ApiError),
    #[error(transparent)]
    Helper(#[from] HelperError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Ssh(#[from] SshError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Create(command) => create_command(command).await,
        Cli::Lookup(command) => lookup_command(command).await,
        Cli::Attach(command) => attach_command(command).await,
        Cli::Detach(command) => detach_command(command).await,
        Cli::Delete(command) => delete_command(command).await,
        Cli::Format(command) => format_command(command).await,
    }
}

async fn helper_from_env() -> Result<VolumeHelper<BlockStorageClient, ComputeClient>, CliError> {
    let config = OpenStackConfig::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))?;
    connect(&config).await.map_err(CliError::Connect)
}

async fn create_command(args: CreateCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    let mut request = CreateVolumeRequest::new(args.size);
    if let Some(name) = args.name {
        request = request.display_name(name);
    }
    if let Some(volume_type) = args.volume_type {
        request = request.volume_type(volume_type);
    }
    if let Some(zone) = args.availability_zone {
        request = request.availability_zone(zone);
    }

    let volume_id = helper.create(&request).await?;
    emit(&volume_id);
    Ok(0)
}

async fn lookup_command(args: LookupCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    let volume_id = helper.lookup(&args.reference).await?;
    emit(&volume_id);
    Ok(0)
}

async fn attach_command(args: AttachCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    let attachment = helper
        .attach(&args.volume, &args.server, &args.device)
        .await?;
    emit(&format!(
        "attached as {} on server {}",
        attachment.device, attachment.server_id
    ));
    Ok(0)
}

async fn detach_command(args: DetachCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    helper.detach(&args.volume).await?;
    Ok(0)
}

async fn delete_command(args: DeleteCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    helper.delete(&args.reference).await?;
    Ok(0)
}

async fn format_command(args: FormatCommand) -> Result<i32, CliError> {
    let helper = helper_from_env().await?;
    let ssh_config = SshConfig::load_without_cli_args()?;
    let shell = RemoteShell::with_process_runner(ssh_config)?;

    let request = FormatRequest::new(args.volume, RemoteLogin::new(args.user, args.password))
        .command(args.command);
    let outcome = helper.format_volume(&shell, &request).await?;
    emit(&format!(
        "formatted {} on server {}",
        outcome.device, outcome.server_id
    ));
    Ok(0)
}

fn emit(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_renders_the_error_chain_head() {
        let mut buf = Vec::new();
        let err = CliError::Config(String::from("missing OS_USERNAME"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("configuration error: missing OS_USERNAME"),
            "rendered: {rendered}"
        );
    }

    #[test]
    fn helper_errors_pass_through_transparently() {
        let err = CliError::from(HelperError::VolumeNotFound {
            reference: String::from("ghost"),
        });
        assert_eq!(
            err.to_string(),
            "no volume matches 'ghost' by id or display name"
        );
    }
}
