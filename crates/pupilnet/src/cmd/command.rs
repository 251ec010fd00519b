use crate::cmd::{CommandArgs, RemoteArgs};
use crate::exit::{remote_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CommandArgs, remote: &RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    if args.text.is_empty() {
        return Err(CliError::new(USAGE, "command text must not be empty"));
    }

    let mut client = remote.connect()?;
    let reply = client
        .send_command(&args.text)
        .map_err(|err| remote_error("command failed", err))?;
    client.close();

    print_reply(&args.text, &reply, format);
    Ok(SUCCESS)
}
