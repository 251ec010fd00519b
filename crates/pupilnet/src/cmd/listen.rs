use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pupilnet_remote::DrainPolicy;
use pupilnet_transport::TopicFilter;
use tracing::info;

use crate::cmd::{ListenArgs, RemoteArgs};
use crate::exit::{remote_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_messages, print_stats, OutputFormat};

pub fn run(args: ListenArgs, remote: &RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let topics = if args.topics.is_empty() {
        TopicFilter::all()
    } else {
        TopicFilter::prefixes(args.topics.iter().cloned())
    };

    let mut client = remote.connect()?;
    let mut stream = client
        .create_streaming_channel(topics)
        .map_err(|err| remote_error("subscribe failed", err))?;
    if args.fail_fast {
        stream.set_policy(DrainPolicy::FailFast);
    }
    // Commands are done; only the stream is needed from here on.
    client.close();
    info!(endpoint = %stream.endpoint(), topics = ?stream.topics(), "listening");

    let mut printed = 0usize;
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }

        let batch = match args.count {
            Some(count) => remaining_batch(args.batch, count, printed),
            None => args.batch as usize,
        };
        let mut messages = match stream.drain(batch) {
            Ok(messages) => messages,
            Err(err) => break Err(remote_error("receive failed", err)),
        };
        if let Some(count) = args.count {
            messages.truncate(count.saturating_sub(printed));
        }

        print_messages(&messages, format);
        printed = printed.saturating_add(messages.len());

        if args.count.is_some_and(|count| printed >= count) {
            break Ok(());
        }
    };

    let stats = stream.stats();
    stream.close();
    info!(
        received = stats.received,
        malformed = stats.malformed,
        timeouts = stats.timeouts,
        "stream closed"
    );
    result?;

    if args.count.is_none() {
        print_stats(&stats, format);
    }
    Ok(SUCCESS)
}

/// Drain no more than what is still needed to reach `count`.
fn remaining_batch(batch: u32, count: usize, printed: usize) -> usize {
    (batch as usize).min(count.saturating_sub(printed)).max(1)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
