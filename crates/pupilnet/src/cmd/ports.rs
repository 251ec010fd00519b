use crate::cmd::RemoteArgs;
use crate::exit::{remote_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(remote: &RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = remote.connect()?;
    let ports = client
        .ports()
        .map_err(|err| remote_error("port discovery failed", err))?;
    let endpoint = client.config().control_endpoint().to_string();
    client.close();

    print_ports(&endpoint, &ports, format);
    Ok(SUCCESS)
}
